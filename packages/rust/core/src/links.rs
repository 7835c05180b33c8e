//! Rewriting relative static-asset links into absolute raw-content URLs.
//!
//! Book pages reference images as `../_static/figures/cells.png`, which
//! resolves on the rendered site but not inside Colab. These links are
//! rooted at the repository's raw-content URL instead.

use std::borrow::Cow;

use regex::{NoExpand, Regex};

use nbcolab_shared::{NbColabError, Result};

/// Marker every candidate line must contain besides the static directory.
const PARENT_DIR: &str = "../";

/// Line-level rewriter for static asset links.
#[derive(Debug, Clone)]
pub struct AssetLinks {
    static_dir: String,
    base_url: String,
    path_re: Regex,
    leftover_parent_re: Regex,
}

impl AssetLinks {
    /// `static_dir` is matched literally; `base_url` must end with `/`.
    pub fn new(static_dir: &str, base_url: &str) -> Result<Self> {
        // A path never crosses a quote, paren, or bracket.
        let path_re = Regex::new(&format!(
            r#"(\.\./[^"'()\[\]]*?{}[^"')\]]*)"#,
            regex::escape(static_dir)
        ))
        .map_err(|e| NbColabError::config(format!("invalid assets.static_dir: {e}")))?;

        let leftover_parent_re = Regex::new(&format!(r"{}(?:\.\./)*", regex::escape(base_url)))
            .map_err(|e| NbColabError::config(format!("invalid assets.raw_base_url: {e}")))?;

        Ok(Self {
            static_dir: static_dir.to_string(),
            base_url: base_url.to_string(),
            path_re,
            leftover_parent_re,
        })
    }

    /// Rewrite every relative static-asset reference in one line.
    ///
    /// Lines without both `../` and the static directory come back borrowed.
    /// Applying this to its own output is a no-op.
    pub fn rewrite_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if !(line.contains(PARENT_DIR) && line.contains(&self.static_dir)) {
            return Cow::Borrowed(line);
        }

        let rooted = self.path_re.replace_all(line, |caps: &regex::Captures| {
            format!("{}{}", self.base_url, caps[1].replace(' ', "%20"))
        });
        let cleaned = self
            .leftover_parent_re
            .replace_all(&rooted, NoExpand(&self.base_url));

        if cleaned == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(cleaned.into_owned())
        }
    }

    /// Rewrite a whole cell source line by line.
    ///
    /// Returns `None` when no line changed, so callers can keep the original
    /// text byte for byte.
    pub fn rewrite_source(&self, source: &str) -> Option<String> {
        let mut changed = false;
        let lines: Vec<Cow<'_, str>> = source
            .split('\n')
            .map(|line| {
                let rewritten = self.rewrite_line(line);
                changed |= matches!(rewritten, Cow::Owned(_));
                rewritten
            })
            .collect();

        changed.then(|| lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://raw.githubusercontent.com/bobiac/bobiac-book/main/";

    fn links() -> AssetLinks {
        AssetLinks::new("_static/", BASE).expect("valid patterns")
    }

    #[test]
    fn markdown_image_is_rooted() {
        let line = "![cells](../_static/images/cells.png)";
        assert_eq!(
            links().rewrite_line(line),
            format!("![cells]({BASE}_static/images/cells.png)")
        );
    }

    #[test]
    fn nested_parent_segments_collapse() {
        let line = r#"<img src="../../../_static/figs/a.png" width="300">"#;
        assert_eq!(
            links().rewrite_line(line),
            format!(r#"<img src="{BASE}_static/figs/a.png" width="300">"#)
        );
    }

    #[test]
    fn spaces_are_percent_encoded() {
        let line = "![plot](../_static/my figures/final plot.png)";
        assert_eq!(
            links().rewrite_line(line),
            format!("![plot]({BASE}_static/my%20figures/final%20plot.png)")
        );
    }

    #[test]
    fn code_string_literal_is_rooted() {
        let line = "img = imread('../_static/data/nuclei.tif')";
        assert_eq!(
            links().rewrite_line(line),
            format!("img = imread('{BASE}_static/data/nuclei.tif')")
        );
    }

    #[test]
    fn multiple_links_on_one_line() {
        let line = "[a](../_static/a.png) and [b](../_static/b.png)";
        assert_eq!(
            links().rewrite_line(line),
            format!("[a]({BASE}_static/a.png) and [b]({BASE}_static/b.png)")
        );
    }

    #[test]
    fn unrelated_lines_are_borrowed() {
        for line in [
            "![local](images/cells.png)",
            "see ../chapter2/intro.md",
            "_static/ without a parent segment",
        ] {
            assert!(matches!(links().rewrite_line(line), Cow::Borrowed(_)), "{line}");
        }
    }

    #[test]
    fn rewriting_is_idempotent() {
        let rewriter = links();
        for line in [
            "![cells](../_static/images/cells.png)",
            "![plot](../../_static/my figures/plot 1.png)",
            "x = '../_static/a.tif'; y = \"../_static/b c.tif\"",
            "See ../notes.md and ![x](../_static/x.png)",
        ] {
            let once = rewriter.rewrite_line(line).into_owned();
            let twice = rewriter.rewrite_line(&once).into_owned();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn unrelated_parent_path_before_link_is_kept() {
        let line = "See ../notes.md and ![x](../_static/x.png)";
        assert_eq!(
            links().rewrite_line(line),
            format!("See ../notes.md and ![x]({BASE}_static/x.png)")
        );
    }

    #[test]
    fn rewrite_source_only_reports_changes() {
        let rewriter = links();
        assert_eq!(rewriter.rewrite_source("# Title\n\nNo assets here.\n"), None);

        let source = "# Title\n![x](../_static/x.png)\n";
        assert_eq!(
            rewriter.rewrite_source(source).as_deref(),
            Some(format!("# Title\n![x]({BASE}_static/x.png)\n").as_str())
        );
    }

    #[test]
    fn custom_layout_is_supported() {
        let rewriter =
            AssetLinks::new("assets/", "https://example.org/raw/").expect("valid patterns");
        assert_eq!(
            rewriter.rewrite_line("![i](../assets/i.png)"),
            "![i](https://example.org/raw/assets/i.png)"
        );
    }
}
