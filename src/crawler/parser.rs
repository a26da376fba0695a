use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Regular post layout: the photo carries a `srcset` with every resolution.
static POST_MEDIA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("img.post_media_photo.image").expect("invalid post media selector")
});

/// Older pages wrap a single plain `<img>` in `div.photo`.
static PHOTO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.photo img").expect("invalid photo selector"));

#[derive(Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    /// Image references on one page, post-media images first, then `div.photo`
    /// images, each in document order. Duplicates are kept.
    #[instrument(skip_all)]
    pub fn image_srcs(&self, page_html: &str) -> Vec<String> {
        let document = Html::parse_document(page_html);
        let mut srcs = Vec::new();

        for img_element in document.select(&POST_MEDIA_SELECTOR) {
            if let Some(src) = responsive_src(img_element) {
                srcs.push(src.to_owned());
            }
        }

        for img_element in document.select(&PHOTO_SELECTOR) {
            if let Some(src) = plain_src(img_element) {
                srcs.push(src.to_owned());
            }
        }

        debug!("Found {} image references", srcs.len());
        srcs
    }
}

fn responsive_src(img_element: ElementRef<'_>) -> Option<&str> {
    img_element
        .value()
        .attr("srcset")
        .and_then(last_srcset_candidate)
        .or_else(|| plain_src(img_element))
}

fn plain_src(img_element: ElementRef<'_>) -> Option<&str> {
    img_element
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|src| !src.is_empty())
}

/// URL of the last `url descriptor` entry in a `srcset` value, which the
/// archive orders from lowest to highest resolution.
pub fn last_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .last()?
        .split_whitespace()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><title>t</title></head><body>{}</body></html>", body)
    }

    #[test]
    fn srcset_yields_last_candidate() {
        assert_eq!(last_srcset_candidate("a.jpg 1x, b.jpg 2x"), Some("b.jpg"));
        assert_eq!(
            last_srcset_candidate("https://x/s_400.png 400w,https://x/s_1280.png 1280w"),
            Some("https://x/s_1280.png")
        );
        assert_eq!(last_srcset_candidate("only.png"), Some("only.png"));
        assert_eq!(last_srcset_candidate("a.jpg 1x, "), Some("a.jpg"));
        assert_eq!(last_srcset_candidate(" , "), None);
    }

    #[test]
    fn prefers_srcset_over_src() {
        let html = page(
            r#"<img class="post_media_photo image" src="small.jpg" srcset="a.jpg 1x, b.jpg 2x">"#,
        );
        assert_eq!(Parser.image_srcs(&html), vec!["b.jpg"]);
    }

    #[test]
    fn falls_back_to_src_without_srcset() {
        let html = page(r#"<img class="post_media_photo image" src="c.jpg">"#);
        assert_eq!(Parser.image_srcs(&html), vec!["c.jpg"]);
    }

    #[test]
    fn requires_both_classes() {
        let html = page(r#"<img class="post_media_photo" src="c.jpg"><img class="image" src="d.jpg">"#);
        assert!(Parser.image_srcs(&html).is_empty());
    }

    #[test]
    fn post_media_before_photo_layout_without_dedup() {
        let html = page(
            r#"
            <div class="photo"><a href="/post/1"><img src="p1.png"></a></div>
            <img class="post_media_photo image" srcset="m1.png 500w, m1_big.png 1280w">
            <div class="photo"><img src="p2.png"></div>
            <img class="image post_media_photo" src="m2.png">
            <div class="photo"><img src="p1.png"></div>
            "#,
        );
        assert_eq!(
            Parser.image_srcs(&html),
            vec!["m1_big.png", "m2.png", "p1.png", "p2.png", "p1.png"]
        );
    }

    #[test]
    fn photo_layout_ignores_srcset() {
        let html = page(r#"<div class="photo"><img src="plain.png" srcset="a.png 1x, big.png 2x"></div>"#);
        assert_eq!(Parser.image_srcs(&html), vec!["plain.png"]);
    }

    #[test]
    fn skips_images_without_source() {
        let html = page(
            r#"<img class="post_media_photo image"><div class="photo"><img src=""></div>"#,
        );
        assert!(Parser.image_srcs(&html).is_empty());
    }

    #[test]
    fn page_without_images() {
        let html = page("<p>No comic today.</p><img src=\"banner.png\">");
        assert!(Parser.image_srcs(&html).is_empty());
    }
}
