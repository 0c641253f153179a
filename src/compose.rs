//! Template composition.
//!
//! A page is produced by parsing its template into a DOM, decorating the
//! tree, splicing in the rendered Markdown and serializing the result:
//!
//! ```text
//! <head>                         <head>
//!   ...                            ...
//! </head>                          <title>Hi</title>
//! <body>              ──►          <style>aggregated css</style>
//!   <nav><a href=/>                <script>block 1</script> ...
//!   <markdown></markdown>          <script src="htmx"></script>
//! </body>                        </head>
//!                                <body>
//!                                  <nav><a href=/ hx-boost=true>
//!                                  <h1>rendered body</h1> ...
//!                                </body>
//! ```
//!
//! The body placeholder is an element (`<markdown>` by default). The
//! rendered body is parsed as an HTML fragment and its nodes replace the
//! placeholder, so markup that happens to contain the placeholder's name as
//! text is never touched. A template without a placeholder gets the body
//! appended to `<body>`.
//!
//! Parsing never fails: html5ever recovers from any input the way a browser
//! does. The template is reparsed for every page since composition mutates
//! the tree.

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::{
    Attribute, LocalName, ParseOpts, QualName, local_name, namespace_url, ns, parse_document,
    parse_fragment,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use maud::{DOCTYPE, PreEscaped, html};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Attribute added to anchors when link boosting is on.
pub const BOOST_ATTRIBUTE: &str = "hx-boost";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("failed to serialize composed page: {0}")]
    Serialize(#[from] std::io::Error),
    #[error("composed page is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Everything injected into a template for one page.
#[derive(Debug, Clone, Copy)]
pub struct Composition<'a> {
    pub title: &'a str,
    /// Aggregated stylesheet text, inlined as a single `<style>`.
    pub css: &'a str,
    /// Inline script blocks, one `<script>` each, in order.
    pub scripts: &'a [String],
    /// Appended as `<script src=..>` after the inline scripts.
    pub external_script: Option<&'a str>,
    pub boost_links: bool,
    /// Rendered page body (HTML).
    pub body: &'a str,
    /// Lowercase element name marking where the body goes.
    pub placeholder_tag: &'a str,
}

/// The template used when no template file is available: a bare document
/// whose body is just the placeholder.
pub fn fallback_template(placeholder_tag: &str) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
            }
            body {
                (PreEscaped(format!("<{placeholder_tag}></{placeholder_tag}>")))
            }
        }
    }
    .into_string()
}

/// Compose one page from `template` text.
pub fn compose(template: &str, page: &Composition<'_>) -> Result<String, ComposeError> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(template);
    let mut body_nodes = Some(parse_body(page.body));
    let mut body_element = None;

    // Explicit worklist over a snapshot of each node's children: the walk
    // appends to <head> and splices into placeholders as it goes.
    let mut worklist = vec![Visit::Template(dom.document.clone())];
    while let Some(visit) = worklist.pop() {
        let (node, from_template) = match visit {
            Visit::Template(node) => (node, true),
            Visit::Body(node) => (node, false),
        };
        let NodeData::Element { name, attrs, .. } = &node.data else {
            push_children(&mut worklist, &node, from_template);
            continue;
        };
        let is_html = name.ns == ns!(html);

        if from_template && is_html && &*name.local == page.placeholder_tag {
            match body_nodes.take() {
                Some(nodes) => {
                    replace_with(&node, &nodes);
                    worklist.extend(nodes.into_iter().rev().map(Visit::Body));
                }
                None => {
                    tracing::warn!(
                        "template has more than one <{}> placeholder; dropping the extra",
                        page.placeholder_tag
                    );
                    detach(&node);
                }
            }
            continue;
        }

        push_children(&mut worklist, &node, from_template);

        if !is_html {
            continue;
        }
        if name.local == local_name!("head") && from_template {
            decorate_head(&node, page);
        } else if name.local == local_name!("body") && from_template && body_element.is_none() {
            body_element = Some(node.clone());
        } else if name.local == local_name!("a") && page.boost_links {
            boost(&mut attrs.borrow_mut());
        }
    }

    if let Some(nodes) = body_nodes {
        tracing::warn!(
            "template has no <{}> placeholder; appending the page body to <body>",
            page.placeholder_tag
        );
        if let Some(body) = &body_element {
            for node in &nodes {
                append(body, node.clone());
            }
            if page.boost_links {
                nodes.iter().for_each(boost_descendants);
            }
        }
    }

    let mut out = Vec::with_capacity(template.len() + page.body.len() + page.css.len());
    serialize(
        &mut out,
        &SerializableHandle::from(dom.document.clone()),
        SerializeOpts::default(),
    )?;
    Ok(String::from_utf8(out)?)
}

enum Visit {
    Template(Handle),
    Body(Handle),
}

fn push_children(worklist: &mut Vec<Visit>, node: &Handle, from_template: bool) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children.into_iter().rev() {
        worklist.push(if from_template {
            Visit::Template(child)
        } else {
            Visit::Body(child)
        });
    }
}

fn decorate_head(head: &Handle, page: &Composition<'_>) {
    let title = element(local_name!("title"), Vec::new());
    if !page.title.is_empty() {
        append(&title, text(page.title));
    }
    append(head, title);

    let style = element(local_name!("style"), Vec::new());
    if !page.css.is_empty() {
        append(&style, text(page.css));
    }
    append(head, style);

    for block in page.scripts {
        let script = element(local_name!("script"), Vec::new());
        append(&script, text(block));
        append(head, script);
    }

    if let Some(url) = page.external_script {
        append(
            head,
            element(local_name!("script"), vec![attribute("src", url)]),
        );
    }
}

fn boost(attrs: &mut Vec<Attribute>) {
    if !attrs.iter().any(|a| &*a.name.local == BOOST_ATTRIBUTE) {
        attrs.push(attribute(BOOST_ATTRIBUTE, "true"));
    }
}

fn boost_descendants(root: &Handle) {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Element { name, attrs, .. } = &node.data
            && name.ns == ns!(html)
            && name.local == local_name!("a")
        {
            boost(&mut attrs.borrow_mut());
        }
        stack.extend(node.children.borrow().iter().cloned());
    }
}

/// Parse rendered HTML as the children of a `<body>` element.
fn parse_body(body: &str) -> Vec<Handle> {
    let dom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        Vec::new(),
    )
    .one(body);

    // The fragment parser wraps its output in a synthetic <html> element.
    let root = dom.document.children.borrow().first().cloned();
    let Some(root) = root else {
        return Vec::new();
    };
    let nodes: Vec<Handle> = root.children.borrow_mut().drain(..).collect();
    for node in &nodes {
        node.parent.set(None);
    }
    nodes
}

// ============================================================================
// Tree plumbing
// ============================================================================

fn element(local: LocalName, attrs: Vec<Attribute>) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), local),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

fn text(contents: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(contents)),
    })
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}

fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

fn detach(node: &Handle) {
    if let Some(parent) = parent_of(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// Put `replacements` where `node` is, then drop `node` from the tree.
fn replace_with(node: &Handle, replacements: &[Handle]) {
    let Some(parent) = parent_of(node) else {
        return;
    };
    {
        let mut children = parent.children.borrow_mut();
        let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, node)) else {
            return;
        };
        children.splice(index..=index, replacements.iter().cloned());
    }
    for replacement in replacements {
        replacement.parent.set(Some(Rc::downgrade(&parent)));
    }
    node.parent.set(None);
}
