//! Mutable HTML documents handed to proxy middleware.

use scraper::node::Text;
use scraper::{Html, Node, Selector};

use crate::proxy::middleware::MiddlewareError;

/// A parsed upstream HTML body. Full documents keep their `<html>`
/// skeleton on serialisation; fragments come back as parsed.
pub struct HtmlDocument {
    html: Html,
    fragment: bool,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        let fragment = !markup.to_ascii_lowercase().contains("<html");
        let html = if fragment {
            Html::parse_fragment(markup)
        } else {
            Html::parse_document(markup)
        };
        Self { html, fragment }
    }

    /// The underlying scraper tree, for edits the helpers below do not cover.
    pub fn inner(&self) -> &Html {
        &self.html
    }

    pub fn inner_mut(&mut self) -> &mut Html {
        &mut self.html
    }

    /// Number of elements matching `css`.
    pub fn count(&self, css: &str) -> Result<usize, MiddlewareError> {
        let selector = selector(css)?;
        Ok(self.html.select(&selector).count())
    }

    /// Text content of every element matching `css`, in document order.
    pub fn text(&self, css: &str) -> Result<Vec<String>, MiddlewareError> {
        let selector = selector(css)?;
        Ok(self
            .html
            .select(&selector)
            .map(|element| element.text().collect())
            .collect())
    }

    /// Replace the children of every element matching `css` with a single
    /// text node. Returns how many elements changed.
    pub fn set_text(&mut self, css: &str, value: &str) -> Result<usize, MiddlewareError> {
        let selector = selector(css)?;
        let targets: Vec<_> = self.html.select(&selector).map(|element| element.id()).collect();

        for &target in &targets {
            let children: Vec<_> = self
                .html
                .tree
                .get(target)
                .map(|node| node.children().map(|child| child.id()).collect())
                .unwrap_or_default();
            for child in children {
                if let Some(mut child) = self.html.tree.get_mut(child) {
                    child.detach();
                }
            }
            if let Some(mut node) = self.html.tree.get_mut(target) {
                node.append(Node::Text(Text { text: value.into() }));
            }
        }
        Ok(targets.len())
    }

    /// Detach every element matching `css`. Returns how many were removed.
    pub fn remove(&mut self, css: &str) -> Result<usize, MiddlewareError> {
        let selector = selector(css)?;
        let targets: Vec<_> = self.html.select(&selector).map(|element| element.id()).collect();
        for &target in &targets {
            if let Some(mut node) = self.html.tree.get_mut(target) {
                node.detach();
            }
        }
        Ok(targets.len())
    }

    /// Serialised markup.
    pub fn html(&self) -> String {
        if self.fragment {
            self.html.root_element().inner_html()
        } else {
            self.html.html()
        }
    }
}

fn selector(css: &str) -> Result<Selector, MiddlewareError> {
    Selector::parse(css).map_err(|e| MiddlewareError(format!("invalid selector '{css}': {e}")))
}
