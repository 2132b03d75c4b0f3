use html5ever::tree_builder::{NodeOrText, TreeSink};
#[cfg(test)]
use scraper::Selector;
use scraper::{Html, Node};

pub(crate) enum DomOperation<Handle> {
    /// Will detach node `node_id` (element, text or comment) together with its subtree.
    RemoveNode { node_id: Handle },
    /// Will drop every attribute of element `node_id`.
    ClearAttributes { node_id: Handle },
    /// Moves the children of element `node_id` in front of it, then drops the element.
    DissolveElement { node_id: Handle },
}

pub(crate) trait MutableDom: TreeSink {
    /// Performs given operation to mutate the tree.
    fn perform_operation(&mut self, op: DomOperation<Self::Handle>);

    /// Performs a sequence of scheduled operations.
    fn perform_operations(&mut self, ops: Vec<DomOperation<Self::Handle>>) {
        for op in ops {
            self.perform_operation(op);
        }
    }
}

impl MutableDom for Html {
    fn perform_operation(&mut self, op: DomOperation<Self::Handle>) {
        match op {
            DomOperation::RemoveNode { node_id } => {
                self.remove_from_parent(&node_id);
            }
            DomOperation::ClearAttributes { node_id } => {
                if let Some(mut node) = self.tree.get_mut(node_id) {
                    if let Node::Element(ref mut elem) = node.value() {
                        elem.attrs.clear();
                    }
                }
            }
            DomOperation::DissolveElement { node_id } => {
                let mut child_ids = Vec::new();
                if let Some(node) = self.tree.get(node_id) {
                    for child in node.children() {
                        child_ids.push(child.id());
                    }
                }

                for id in child_ids {
                    self.append_before_sibling(&node_id, NodeOrText::AppendNode(id));
                }

                self.remove_from_parent(&node_id);
            }
        }
    }
}

#[test]
fn test_remove_node() {
    let mut doc = Html::parse_fragment("<p>Keep</p><p class='ad'>Buy <em>now</em></p><p>Also keep</p>");
    let ad = doc.select(&Selector::parse(".ad").unwrap()).next().expect("Ad paragraph not found.");

    doc.perform_operation(DomOperation::RemoveNode { node_id: ad.id() });

    assert_eq!(
        Html::parse_fragment("<p>Keep</p><p>Also keep</p>"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}

#[test]
fn test_clear_attributes() {
    let mut doc = Html::parse_fragment("<p style='color: red' class='x' data-id='7'><strong id='bold'>Bold</strong></p>");
    let p = doc.select(&Selector::parse("p").unwrap()).next().expect("Paragraph not found.");

    doc.perform_operation(DomOperation::ClearAttributes { node_id: p.id() });

    assert_eq!(
        Html::parse_fragment("<p><strong id='bold'>Bold</strong></p>"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}

#[test]
fn test_dissolve_element() {
    let mut doc = Html::parse_fragment("<p>She <font color='red'><i>never</i> looked</font> back.</p><p>Then <span>silence</span>.</p>");
    let font = doc.select(&Selector::parse("font").unwrap()).next().expect("Font element not found.");

    doc.perform_operation(DomOperation::DissolveElement { node_id: font.id() });

    assert_eq!(
        Html::parse_fragment("<p>She <i>never</i> looked back.</p><p>Then <span>silence</span>.</p>"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}

#[test]
fn test_dissolve_nested_in_document_order() {
    let mut doc = Html::parse_fragment("<div><span><p>One</p></span><font>Two</font></div>");
    let ids: Vec<_> = doc
        .select(&Selector::parse("div, span, font").unwrap())
        .map(|elem| elem.id())
        .collect();

    doc.perform_operations(ids.into_iter().map(|node_id| DomOperation::DissolveElement { node_id }).collect());

    assert_eq!(
        Html::parse_fragment("<p>One</p>Two"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}
