use scraper::ElementRef;
#[cfg(test)]
use scraper::{Html, Selector};
use xml5ever::serialize::{serialize, SerializeOpts, TraversalScope};

pub(crate) trait XmlSerializable {
    fn serialize_xml(&self, traversal_scope: TraversalScope) -> String;

    /// Returns the inner XML of this element.
    fn inner_xml(&self) -> String {
        self.serialize_xml(TraversalScope::ChildrenOnly(None))
    }
}

impl<'a> XmlSerializable for ElementRef<'a> {
    fn serialize_xml(&self, traversal_scope: TraversalScope) -> String {
        let opts = SerializeOpts { traversal_scope };
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = serialize(&mut buf, self, opts);
        String::from_utf8_lossy(&buf)
            // The serializer does not support XML fragments,
            // we need to remove redundant namespace attributes.
            .replace(r#" xmlns="http://www.w3.org/1999/xhtml""#, "")
    }
}

#[test]
fn test_inner_xml_is_well_formed() {
    let doc = Html::parse_fragment("<div><p>One<br>Two &amp; three</p><hr></div>");
    let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
    let xml = div.inner_xml();

    assert!(
        xml.contains("<br/>") || xml.contains("<br />") || xml.contains("<br></br>"),
        "{xml}"
    );
    assert!(xml.contains("Two &amp; three"), "{xml}");
    assert!(!xml.contains("xmlns"), "{xml}");
}
