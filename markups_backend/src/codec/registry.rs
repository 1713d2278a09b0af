use crate::codec::plane::PlaneJsonCodec;
use crate::codec::{CodecError, MarkupCodec};
use crate::markup::MarkupsNode;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

type CodecFactory = fn() -> Box<dyn MarkupCodec>;

/// Storage codecs available for creation by their tag name
#[derive(Clone, Default)]
pub struct CodecRegistry {
    factories: BTreeMap<&'static str, CodecFactory>,
}

impl Debug for CodecRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl CodecRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_codecs() -> Self {
        let mut registry = Self::new();
        registry.register(|| Box::new(PlaneJsonCodec));
        registry
    }

    /// Registers a codec under the tag it reports. Replaces any codec
    /// previously registered under the same tag.
    pub fn register(&mut self, factory: CodecFactory) {
        let tag = factory().tag_name();
        self.factories.insert(tag, factory);
    }

    pub fn create(&self, tag: &str) -> Result<Box<dyn MarkupCodec>, CodecError> {
        self.factories
            .get(tag)
            .map(|factory| factory())
            .ok_or_else(|| CodecError::UnknownTag(tag.to_string()))
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Picks the first codec, in tag order, able to read into `node`
    pub fn codec_for_node(&self, node: &MarkupsNode) -> Result<Box<dyn MarkupCodec>, CodecError> {
        self.factories
            .values()
            .map(|factory| factory())
            .find(|codec| codec.can_read_in_reference_node(Some(node)))
            .ok_or(CodecError::NoCodec(node.markup_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::CodecRegistry;
    use crate::codec::CodecError;
    use crate::markup::{MarkupType, MarkupsNode};
    use itertools::Itertools;
    use rstest::rstest;

    #[test]
    fn should_list_default_codecs() {
        let registry = CodecRegistry::with_default_codecs();
        assert_eq!(
            registry.tags().collect_vec(),
            vec!["MarkupsPlaneJsonStorage"]
        );
        assert!(CodecRegistry::new().tags().next().is_none());
    }

    #[test]
    fn should_create_by_tag() {
        let registry = CodecRegistry::with_default_codecs();
        let codec = registry.create("MarkupsPlaneJsonStorage").unwrap();
        assert_eq!(codec.tag_name(), "MarkupsPlaneJsonStorage");

        assert!(matches!(
            registry.create("MarkupsLineJsonStorage"),
            Err(CodecError::UnknownTag(tag)) if tag == "MarkupsLineJsonStorage"
        ));
    }

    #[rstest]
    #[case(MarkupType::Plane, true)]
    #[case(MarkupType::Fiducial, false)]
    #[case(MarkupType::ClosedCurve, false)]
    fn should_pick_codec_for_node(#[case] ty: MarkupType, #[case] found: bool) {
        let registry = CodecRegistry::with_default_codecs();
        let result = registry.codec_for_node(&MarkupsNode::new(ty));
        assert_eq!(result.is_ok(), found);
        if let Err(err) = result {
            assert!(matches!(err, CodecError::NoCodec(t) if t == ty));
        }
    }

    #[test]
    fn should_format_debug_as_tags() {
        let registry = CodecRegistry::with_default_codecs();
        assert_eq!(format!("{registry:?}"), r#"{"MarkupsPlaneJsonStorage"}"#);
    }
}
