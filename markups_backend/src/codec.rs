use crate::json_utils::element::JsonElement;
use crate::json_utils::writer::JsonWriter;
use crate::markup::{MarkupType, MarkupsNode};
use dyn_clone::DynClone;
use miette::Diagnostic;
use std::fmt::Debug;
use thiserror::Error;

pub mod common;
pub mod plane;
pub mod registry;

pub use plane::PlaneJsonCodec;
pub use registry::CodecRegistry;

/// Translates one markup type between its in-memory and JSON representation
///
/// Implementations are stateless. Fields shared by every markup type are
/// handled by [common]; implementations must delegate to it before handling
/// their own fields.
pub trait MarkupCodec: DynClone + Debug + Send + Sync + 'static {
    /// Identifier of the codec in the registration table
    fn tag_name(&self) -> &'static str;

    /// Whether this codec can store the given node
    fn can_read_in_reference_node(&self, node: Option<&MarkupsNode>) -> bool;

    /// Fresh instance of the same codec
    fn create_node_instance(&self) -> Box<dyn MarkupCodec>;

    /// Appends the properties of `node` to the writer's object
    fn write_basic_properties(
        &self,
        writer: &mut JsonWriter,
        node: &MarkupsNode,
    ) -> miette::Result<()>;

    /// Populates `node` from a parsed markup object
    ///
    /// On error the node may be partially updated and should be discarded.
    fn update_markups_node_from_json_value(
        &self,
        node: &mut MarkupsNode,
        element: JsonElement<'_>,
    ) -> miette::Result<()>;

    /// Keys this codec understands in addition to the common ones
    fn known_keys(&self) -> &'static [&'static str] {
        &[]
    }
}

dyn_clone::clone_trait_object!(MarkupCodec);

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum CodecError {
    #[error("codec `{codec}` can't handle markups of type `{actual}`")]
    TypeMismatch {
        codec: &'static str,
        actual: MarkupType,
    },
    #[error("file contains a markup of type `{found}`, but the node is `{expected}`")]
    UnexpectedMarkupType { expected: MarkupType, found: String },
    #[error("no storage codec is registered for markups of type `{0}`")]
    #[diagnostic(help("only registered markup types can be saved or loaded"))]
    NoCodec(MarkupType),
    #[error("unknown storage codec `{0}`")]
    UnknownTag(String),
}
