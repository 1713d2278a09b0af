//! Loading and saving of whole markups documents
//!
//! A document is a JSON object of the form
//! `{"@schema": <url>, "markups": [<markup object>...]}`.

use crate::codec::common::COMMON_KEYS;
use crate::codec::{CodecRegistry, MarkupCodec};
use crate::config::StorageConfig;
use crate::json_utils::element::JsonElement;
use crate::json_utils::{JsonMap, JsonValue};
use crate::m_try;
use crate::markup::{MarkupType, MarkupsNode};
use camino::{Utf8Path, Utf8PathBuf};
use diagnostic::prelude::{DiagnosticContext, DiagnosticContextMut};
use miette::{bail, miette, Context, IntoDiagnostic};
use std::str::FromStr;
use tracing::{debug, info};

const MEMORY_IDENT: &str = "<memory>";

/// Checks that the schema URL names any 1.x revision of the markups schema
pub fn is_markups_schema_v1(url: &str) -> bool {
    url.contains("markups-schema-v1.")
}

/// Storage node of markups documents
///
/// Owns the file name and the storage configuration, and collects warnings
/// produced while reading documents.
#[derive(Debug)]
pub struct MarkupsJsonStorageNode<'r> {
    registry: &'r CodecRegistry,
    config: StorageConfig,
    file_name: Option<Utf8PathBuf>,
    diagnostics: DiagnosticContext,
}

impl<'r> MarkupsJsonStorageNode<'r> {
    pub fn new(registry: &'r CodecRegistry, config: StorageConfig) -> Self {
        Self {
            registry,
            config,
            file_name: None,
            diagnostics: Default::default(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<Utf8PathBuf>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn file_name(&self) -> Option<&Utf8Path> {
        self.file_name.as_deref()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &DiagnosticContext {
        &self.diagnostics
    }

    /// Builds a document holding all `nodes`
    ///
    /// Fails when any of the nodes has no eligible codec, or when any of
    /// them fails to serialize.
    pub fn write_document(&self, nodes: &[MarkupsNode]) -> miette::Result<JsonValue> {
        let markups = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                m_try(|| {
                    let codec = self.registry.codec_for_node(node)?;
                    debug!(codec = codec.tag_name(), "writing markup");
                    let mut writer = self.config.writer();
                    codec.write_basic_properties(&mut writer, node)?;
                    Ok(writer.finish())
                })
                .with_context(|| format!("failed to write markup #{i} `{}`", node.name))
            })
            .collect::<miette::Result<Vec<_>>>()?;

        let mut document = JsonMap::new();
        document.insert(
            "@schema".to_string(),
            JsonValue::String(self.config.schema.clone()),
        );
        document.insert("markups".to_string(), JsonValue::Array(markups));
        Ok(JsonValue::Object(document))
    }

    /// Writes `nodes` to `path`, or to the node's file name when no path is given
    pub fn write_file(&self, path: Option<&Utf8Path>, nodes: &[MarkupsNode]) -> miette::Result<()> {
        let path = self.resolve_path(path)?;
        m_try(|| {
            let document = self.write_document(nodes)?;
            let data = if self.config.pretty {
                serde_json::to_string_pretty(&document)
            } else {
                serde_json::to_string(&document)
            }
            .into_diagnostic()
            .context("failed to serialize document")?;
            fs_err::write(path, data)
                .into_diagnostic()
                .context("failed to write file")?;
            Ok(())
        })
        .with_context(|| format!("failed to save markups to `{path}`"))?;

        info!(%path, count = nodes.len(), "saved markups");
        Ok(())
    }

    /// Reads the first markup of the node's type from `json` into `node`
    pub fn read_document(&mut self, json: &JsonValue, node: &mut MarkupsNode) -> miette::Result<()> {
        let ident = self.ident();
        let mut diagnostics = self.diagnostics.enter(&ident);
        diagnostics.clear_downstream();
        let markups = read_markups_array(json, &self.config, &mut diagnostics)?;

        let expected = node.markup_type();
        let codec = self.registry.codec_for_node(node)?;
        debug!(codec = codec.tag_name(), "reading markup");

        let Some((i, element)) = markups.into_iter().enumerate().find(|(_, element)| {
            element
                .get("type")
                .and_then(JsonValue::as_str)
                .map_or(true, |ty| ty == expected.to_string())
        }) else {
            bail!("document contains no markups of type `{expected}`");
        };

        let mut diagnostics = diagnostics.enter_field("markups");
        read_markup(&*codec, &self.config, element, node, &mut diagnostics.enter_index(i))
            .with_context(|| format!("failed to read markups[{i}]"))?;
        Ok(())
    }

    /// Reads every markup of the document that has a registered codec
    ///
    /// Markups of other types are skipped with a warning.
    pub fn read_all(&mut self, json: &JsonValue) -> miette::Result<Vec<MarkupsNode>> {
        let ident = self.ident();
        let mut diagnostics = self.diagnostics.enter(&ident);
        diagnostics.clear_downstream();
        let markups = read_markups_array(json, &self.config, &mut diagnostics)?;
        let mut diagnostics = diagnostics.enter_field("markups");

        let mut nodes = Vec::with_capacity(markups.len());
        for (i, element) in markups.into_iter().enumerate() {
            let mut diagnostics = diagnostics.enter_index(i);
            let ty = match element.get_string("type")? {
                None => {
                    diagnostics.emit_warning(miette!("markup has no `type`, skipping"));
                    continue;
                }
                Some(ty) => match MarkupType::from_str(ty) {
                    Ok(ty) => ty,
                    Err(_) => {
                        diagnostics.emit_warning(miette!("unknown markup type `{ty}`, skipping"));
                        continue;
                    }
                },
            };

            let mut node = MarkupsNode::new(ty);
            let Ok(codec) = self.registry.codec_for_node(&node) else {
                diagnostics.emit_warning(miette!(
                    "markups of type `{ty}` are not supported, skipping"
                ));
                continue;
            };
            read_markup(&*codec, &self.config, element, &mut node, &mut diagnostics)
                .with_context(|| format!("failed to read markups[{i}]"))?;
            nodes.push(node);
        }

        Ok(nodes)
    }

    /// Reads `path`, or the node's file name when no path is given, into `node`
    pub fn read_file(&mut self, path: Option<&Utf8Path>, node: &mut MarkupsNode) -> miette::Result<()> {
        let path = self.resolve_path(path)?.to_path_buf();
        let json = self.load_json(&path)?;
        self.with_ident(path.clone(), |storage| storage.read_document(&json, node))
            .with_context(|| format!("failed to load markups from `{path}`"))?;
        info!(%path, name = %node.name, "loaded markup");
        Ok(())
    }

    /// Reads every supported markup from `path`, or from the node's file name
    pub fn read_all_file(&mut self, path: Option<&Utf8Path>) -> miette::Result<Vec<MarkupsNode>> {
        let path = self.resolve_path(path)?.to_path_buf();
        let json = self.load_json(&path)?;
        let nodes = self
            .with_ident(path.clone(), |storage| storage.read_all(&json))
            .with_context(|| format!("failed to load markups from `{path}`"))?;
        info!(%path, count = nodes.len(), "loaded markups");
        Ok(nodes)
    }

    fn load_json(&self, path: &Utf8Path) -> miette::Result<JsonValue> {
        let data = fs_err::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("failed to read `{path}`"))?;
        serde_json::from_str(&data)
            .into_diagnostic()
            .with_context(|| format!("failed to parse `{path}` as JSON"))
    }

    /// Runs `func` with diagnostics attributed to `path`
    fn with_ident<T>(
        &mut self,
        path: Utf8PathBuf,
        func: impl FnOnce(&mut Self) -> miette::Result<T>,
    ) -> miette::Result<T> {
        let previous = self.file_name.replace(path);
        let result = func(self);
        self.file_name = previous;
        result
    }

    fn resolve_path<'a>(&'a self, path: Option<&'a Utf8Path>) -> miette::Result<&'a Utf8Path> {
        match path.or(self.file_name.as_deref()) {
            Some(path) => Ok(path),
            None => bail!("storage node has no file name"),
        }
    }

    fn ident(&self) -> String {
        self.file_name
            .as_ref()
            .map_or_else(|| MEMORY_IDENT.to_string(), |path| path.to_string())
    }
}

fn read_markups_array<'a>(
    json: &'a JsonValue,
    config: &StorageConfig,
    diagnostics: &mut DiagnosticContextMut,
) -> miette::Result<Vec<JsonElement<'a>>> {
    let root = JsonElement::new(json).context("markups document must be a JSON object")?;

    match root.get_string("@schema")? {
        Some(url) if is_markups_schema_v1(url) => {
            if url != config.schema {
                debug!(url, "document uses a different markups schema revision");
            }
        }
        Some(url) => diagnostics
            .enter_field("@schema")
            .emit_warning(miette!("`{url}` is not a markups schema v1 URL")),
        None => diagnostics.emit_warning(miette!("document has no `@schema`")),
    }

    root.get_object_array("markups")?
        .ok_or_else(|| miette!("document has no `markups` array"))
}

fn read_markup(
    codec: &dyn MarkupCodec,
    config: &StorageConfig,
    element: JsonElement<'_>,
    node: &mut MarkupsNode,
    diagnostics: &mut DiagnosticContextMut,
) -> miette::Result<()> {
    codec.update_markups_node_from_json_value(node, element)?;

    if config.warn_unknown_keys {
        let known = codec.known_keys();
        for key in element.keys() {
            if !COMMON_KEYS.contains(&key) && !known.contains(&key) {
                diagnostics
                    .enter_field(key.to_string())
                    .emit_warning(miette!("unknown key `{key}`"));
            }
        }
    }

    Ok(())
}
