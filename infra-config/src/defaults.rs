//! Default application for nested configuration structs.
//!
//! Structs opt in through [`ApplyDefaults`], normally derived with
//! `#[derive(ApplyDefaults)]`. Leaf fields name an inline default with
//! `#[defaults(value = "...")]`; nested structs are marked `#[defaults(nested)]`.
//! A [`Defaulter`] walks the struct depth-first in declaration order and fills
//! every leaf that is still unset from the inline annotation and/or a
//! [`DefaultsDocument`], in the order its [`Precedence`] dictates.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{DefaultsDocument, describe, load_defaults_document};

/// Semantic type of a defaultable leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Signed or unsigned integer.
    Integer,
    /// Floating point number.
    Float,
    /// UTF-8 string.
    String,
    /// Boolean flag.
    Boolean,
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
        })
    }
}

/// Leaf field type that can receive a default.
///
/// `is_unset` decides whether a caller supplied a value. Zero, empty, and
/// `false` count as unset, so wrap a field in [`Option`] when its zero value
/// is meaningful.
pub trait DefaultableField: Sized {
    /// Semantic type reported in errors and logs.
    const KIND: FieldKind;

    /// Returns `true` when the field still holds its unset value.
    fn is_unset(&self) -> bool;

    /// Parses an inline annotation literal such as `"90"`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the literal does not parse.
    fn parse_default(raw: &str) -> Result<Self, String>;

    /// Converts a defaults document entry.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the entry has the wrong shape.
    fn from_document(value: &Value) -> Result<Self, String>;
}

macro_rules! integer_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DefaultableField for $ty {
                const KIND: FieldKind = FieldKind::Integer;

                fn is_unset(&self) -> bool {
                    *self == 0
                }

                fn parse_default(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|err| err.to_string())
                }

                fn from_document(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Number(n) => {
                            if let Some(i) = n.as_i64() {
                                <$ty>::try_from(i).map_err(|err| err.to_string())
                            } else if let Some(u) = n.as_u64() {
                                <$ty>::try_from(u).map_err(|err| err.to_string())
                            } else {
                                Err(format!("expected an integer, found `{n}`"))
                            }
                        }
                        Value::String(s) => Self::parse_default(s),
                        other => Err(format!("expected an integer, found {}", describe(other))),
                    }
                }
            }
        )*
    };
}

integer_field!(i32, i64, u16, u32, u64);

impl DefaultableField for f64 {
    const KIND: FieldKind = FieldKind::Float;

    #[allow(clippy::float_cmp)]
    fn is_unset(&self) -> bool {
        *self == 0.0
    }

    fn parse_default(raw: &str) -> Result<Self, String> {
        raw.trim().parse::<f64>().map_err(|err| err.to_string())
    }

    fn from_document(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("expected a float, found `{n}`")),
            Value::String(s) => Self::parse_default(s),
            other => Err(format!("expected a float, found {}", describe(other))),
        }
    }
}

impl DefaultableField for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn is_unset(&self) -> bool {
        !*self
    }

    fn parse_default(raw: &str) -> Result<Self, String> {
        raw.trim().parse::<bool>().map_err(|err| err.to_string())
    }

    fn from_document(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => Self::parse_default(s),
            other => Err(format!("expected a boolean, found {}", describe(other))),
        }
    }
}

impl DefaultableField for String {
    const KIND: FieldKind = FieldKind::String;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn parse_default(raw: &str) -> Result<Self, String> {
        Ok(raw.to_owned())
    }

    fn from_document(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(format!("expected a string, found {}", describe(other))),
        }
    }
}

impl<T: DefaultableField> DefaultableField for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn parse_default(raw: &str) -> Result<Self, String> {
        T::parse_default(raw).map(Some)
    }

    fn from_document(value: &Value) -> Result<Self, String> {
        T::from_document(value).map(Some)
    }
}

/// Configuration struct whose fields can be defaulted.
pub trait ApplyDefaults {
    /// Visits every field in declaration order, delegating leaves to
    /// [`DefaultsContext::leaf`] and nested structs to [`DefaultsContext::nested`].
    ///
    /// # Errors
    ///
    /// Propagates [`ConfigError::InvalidDefault`] from any leaf.
    fn apply_defaults(&mut self, ctx: &mut DefaultsContext<'_>) -> ConfigResult<()>;
}

/// Which default sources are consulted, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precedence {
    /// Document entry wins; the inline annotation is the fallback.
    DocumentFirst,
    /// Inline annotation wins; the document entry is the fallback.
    AnnotationFirst,
    /// Only the document is consulted.
    DocumentOnly,
    /// Only inline annotations are consulted.
    AnnotationOnly,
}

impl Precedence {
    const fn order(self) -> &'static [DefaultSource] {
        match self {
            Self::DocumentFirst => &[DefaultSource::Document, DefaultSource::Annotation],
            Self::AnnotationFirst => &[DefaultSource::Annotation, DefaultSource::Document],
            Self::DocumentOnly => &[DefaultSource::Document],
            Self::AnnotationOnly => &[DefaultSource::Annotation],
        }
    }
}

impl Display for Precedence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DocumentFirst => "document-first",
            Self::AnnotationFirst => "annotation-first",
            Self::DocumentOnly => "document-only",
            Self::AnnotationOnly => "annotation-only",
        })
    }
}

impl FromStr for Precedence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document-first" => Ok(Self::DocumentFirst),
            "annotation-first" => Ok(Self::AnnotationFirst),
            "document-only" => Ok(Self::DocumentOnly),
            "annotation-only" => Ok(Self::AnnotationOnly),
            other => Err(ConfigError::invalid_value(
                "precedence",
                format!(
                    "`{other}` is not one of document-first, annotation-first, document-only, annotation-only"
                ),
            )),
        }
    }
}

/// Where an applied default came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSource {
    /// The field's inline `#[defaults(value = "...")]` annotation.
    Annotation,
    /// The defaults document.
    Document,
}

impl Display for DefaultSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Annotation => "annotation",
            Self::Document => "document",
        })
    }
}

/// A single default assigned during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDefault {
    path: String,
    kind: FieldKind,
    source: DefaultSource,
    value: String,
}

impl AppliedDefault {
    /// Dotted path of the field.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Semantic type of the field.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Source the value was taken from.
    #[must_use]
    pub fn source(&self) -> DefaultSource {
        self.source
    }

    /// The raw default as text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Outcome of a successful default application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DefaultsReport {
    visited: Vec<String>,
    applied: Vec<AppliedDefault>,
}

impl DefaultsReport {
    /// Paths of the nested structs entered, in visiting order.
    #[must_use]
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// Defaults assigned, in visiting order.
    #[must_use]
    pub fn applied(&self) -> &[AppliedDefault] {
        &self.applied
    }

    /// Returns the applied default for `path`, if any.
    #[must_use]
    pub fn applied_to(&self, path: &str) -> Option<&AppliedDefault> {
        self.applied.iter().find(|applied| applied.path == path)
    }
}

enum Candidate<'a> {
    Annotation(&'a str),
    Document(&'a Value),
}

/// State threaded through an [`ApplyDefaults`] walk.
#[derive(Debug)]
pub struct DefaultsContext<'a> {
    document: Option<&'a DefaultsDocument>,
    precedence: Precedence,
    path: Vec<String>,
    report: DefaultsReport,
}

impl<'a> DefaultsContext<'a> {
    /// Creates a context rooted at the top of `document`.
    #[must_use]
    pub fn new(document: Option<&'a DefaultsDocument>, precedence: Precedence) -> Self {
        Self {
            document,
            precedence,
            path: Vec::new(),
            report: DefaultsReport::default(),
        }
    }

    /// Returns the precedence in effect.
    #[must_use]
    pub const fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Consumes the context, returning what the walk did.
    #[must_use]
    pub fn into_report(self) -> DefaultsReport {
        self.report
    }

    /// Assigns a default to `slot` when it is unset.
    ///
    /// `key` names the field in the defaults document, relative to the current
    /// nested struct.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefault`] when the chosen default cannot be
    /// converted to `T`. `slot` is left untouched in that case.
    pub fn leaf<T: DefaultableField>(
        &mut self,
        key: &str,
        slot: &mut T,
        annotation: Option<&str>,
    ) -> ConfigResult<()> {
        if !slot.is_unset() {
            trace!(path = %self.path_to(key), "field already set");
            return Ok(());
        }

        let Some(candidate) = self.resolve(key, annotation) else {
            trace!(path = %self.path_to(key), "no default declared");
            return Ok(());
        };

        let path = self.path_to(key);
        let (parsed, source, raw) = match candidate {
            Candidate::Annotation(raw) => (
                T::parse_default(raw),
                DefaultSource::Annotation,
                raw.to_owned(),
            ),
            Candidate::Document(value) => (
                T::from_document(value),
                DefaultSource::Document,
                match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            ),
        };

        let value = parsed.map_err(|reason| ConfigError::InvalidDefault {
            path: path.clone(),
            kind: T::KIND,
            value: format!("{source} `{raw}`"),
            reason,
        })?;

        let kind = T::KIND;
        debug!(path = %path, %kind, %source, value = %raw, "applied default");
        *slot = value;
        self.report.applied.push(AppliedDefault {
            path,
            kind: T::KIND,
            source,
            value: raw,
        });
        Ok(())
    }

    /// Recurses into a nested configuration struct stored under `key`.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while defaulting the nested struct.
    pub fn nested<T: ApplyDefaults + ?Sized>(
        &mut self,
        key: &str,
        child: &mut T,
    ) -> ConfigResult<()> {
        self.path.push(key.to_owned());
        let path = self.path.join(".");
        trace!(path = %path, "entering nested struct");
        self.report.visited.push(path);
        let result = child.apply_defaults(self);
        self.path.pop();
        result
    }

    fn resolve<'s>(&self, key: &str, annotation: Option<&'s str>) -> Option<Candidate<'s>>
    where
        'a: 's,
    {
        self.precedence.order().iter().find_map(|source| match source {
            DefaultSource::Annotation => annotation.map(Candidate::Annotation),
            DefaultSource::Document => {
                let document = self.document?;
                let mut segments: Vec<&str> = self.path.iter().map(String::as_str).collect();
                segments.push(key);
                document
                    .lookup(&segments)
                    .filter(|value| !value.is_null())
                    .map(Candidate::Document)
            }
        })
    }

    fn path_to(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path.join("."))
        }
    }
}

#[derive(Debug, Clone)]
enum DocumentSource {
    None,
    File(PathBuf),
    Inline(DefaultsDocument),
}

/// Applies defaults to configuration structs.
///
/// The defaults file, when configured, is read on every [`Defaulter::apply`]
/// call so edits are picked up without rebuilding the defaulter.
#[derive(Debug, Clone)]
pub struct Defaulter {
    precedence: Precedence,
    source: DocumentSource,
}

impl Defaulter {
    /// Creates a defaulter that consults inline annotations only until a
    /// document is attached.
    #[must_use]
    pub fn new(precedence: Precedence) -> Self {
        Self {
            precedence,
            source: DocumentSource::None,
        }
    }

    /// Reads the defaults document from `path` on every application.
    #[must_use]
    pub fn with_defaults_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = DocumentSource::File(path.into());
        self
    }

    /// Uses an already loaded defaults document.
    #[must_use]
    pub fn with_document(mut self, document: DefaultsDocument) -> Self {
        self.source = DocumentSource::Inline(document);
        self
    }

    /// Returns the configured precedence.
    #[must_use]
    pub const fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Fills every unset, defaultable field of `target`.
    ///
    /// The walk runs on a copy; `target` is only replaced once every default has
    /// been applied, so on error it is left exactly as the caller passed it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`], [`ConfigError::Parse`], or
    /// [`ConfigError::Conversion`] if the defaults file cannot be loaded, and
    /// [`ConfigError::InvalidDefault`] if a default does not fit its field.
    pub fn apply<T: ApplyDefaults + Clone>(&self, target: &mut T) -> ConfigResult<DefaultsReport> {
        let loaded;
        let document = match &self.source {
            DocumentSource::None => None,
            DocumentSource::File(path) => {
                loaded = load_defaults_document(path)?;
                Some(&loaded)
            }
            DocumentSource::Inline(document) => Some(document),
        };

        let mut working = target.clone();
        let mut ctx = DefaultsContext::new(document, self.precedence);
        working.apply_defaults(&mut ctx)?;
        *target = working;

        let report = ctx.into_report();
        debug!(
            precedence = %self.precedence,
            visited = report.visited.len(),
            applied = report.applied.len(),
            "defaults applied"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Disk {
        size_gb: i64,
        kind: String,
    }

    impl ApplyDefaults for Disk {
        fn apply_defaults(&mut self, ctx: &mut DefaultsContext<'_>) -> ConfigResult<()> {
            ctx.leaf("sizeGb", &mut self.size_gb, Some("90"))?;
            ctx.leaf("kind", &mut self.kind, Some("PD-STANDARD"))
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Pool {
        name: String,
        autoscale: Option<bool>,
        disk: Disk,
    }

    impl ApplyDefaults for Pool {
        fn apply_defaults(&mut self, ctx: &mut DefaultsContext<'_>) -> ConfigResult<()> {
            ctx.leaf("name", &mut self.name, None)?;
            ctx.leaf("autoscale", &mut self.autoscale, Some("true"))?;
            ctx.nested("disk", &mut self.disk)
        }
    }

    fn document() -> DefaultsDocument {
        let Value::Object(entries) = json!({
            "name": "from-document",
            "disk": { "sizeGb": 120, "kind": null }
        }) else {
            unreachable!()
        };
        DefaultsDocument::from_map(entries)
    }

    #[test]
    fn annotation_only_ignores_document() {
        let mut pool = Pool::default();
        Defaulter::new(Precedence::AnnotationOnly)
            .with_document(document())
            .apply(&mut pool)
            .unwrap();

        assert_eq!(pool.name, "");
        assert_eq!(pool.autoscale, Some(true));
        assert_eq!(pool.disk.size_gb, 90);
        assert_eq!(pool.disk.kind, "PD-STANDARD");
    }

    #[test]
    fn document_first_falls_back_to_annotation() {
        let mut pool = Pool::default();
        let report = Defaulter::new(Precedence::DocumentFirst)
            .with_document(document())
            .apply(&mut pool)
            .unwrap();

        assert_eq!(pool.name, "from-document");
        assert_eq!(pool.disk.size_gb, 120);
        // null entries count as absent
        assert_eq!(pool.disk.kind, "PD-STANDARD");

        let size = report.applied_to("disk.sizeGb").unwrap();
        assert_eq!(size.source(), DefaultSource::Document);
        assert_eq!(size.value(), "120");
        assert_eq!(
            report.applied_to("disk.kind").unwrap().source(),
            DefaultSource::Annotation
        );
    }

    #[derive(Clone, Debug, Default, PartialEq, crate::ApplyDefaults)]
    struct DerivedPool {
        name: String,
        #[defaults(value = "true")]
        autoscale: Option<bool>,
        #[defaults(nested)]
        disk: Disk,
    }

    #[test]
    fn derived_impl_matches_handwritten() {
        for precedence in [
            Precedence::AnnotationOnly,
            Precedence::DocumentFirst,
            Precedence::AnnotationFirst,
            Precedence::DocumentOnly,
        ] {
            let defaulter = Defaulter::new(precedence).with_document(document());
            let mut pool = Pool::default();
            let mut derived = DerivedPool::default();
            let expected = defaulter.apply(&mut pool).unwrap();
            let report = defaulter.apply(&mut derived).unwrap();

            assert_eq!(derived.name, pool.name, "{precedence}");
            assert_eq!(derived.autoscale, pool.autoscale, "{precedence}");
            assert_eq!(derived.disk, pool.disk, "{precedence}");
            assert_eq!(report.visited(), expected.visited());
        }
    }

    #[test]
    fn annotation_first_prefers_annotation() {
        let mut pool = Pool::default();
        Defaulter::new(Precedence::AnnotationFirst)
            .with_document(document())
            .apply(&mut pool)
            .unwrap();

        assert_eq!(pool.disk.size_gb, 90);
        // no annotation on `name`, so the document fills it
        assert_eq!(pool.name, "from-document");
    }

    #[test]
    fn document_only_skips_annotations() {
        let mut pool = Pool::default();
        Defaulter::new(Precedence::DocumentOnly)
            .with_document(document())
            .apply(&mut pool)
            .unwrap();

        assert_eq!(pool.disk.size_gb, 120);
        assert_eq!(pool.disk.kind, "");
        assert_eq!(pool.autoscale, None);
    }

    #[test]
    fn caller_values_are_kept() {
        let mut pool = Pool {
            name: "mine".into(),
            autoscale: Some(false),
            disk: Disk {
                size_gb: 80,
                kind: "PD-SSD".into(),
            },
        };
        let expected = pool.clone();

        let report = Defaulter::new(Precedence::DocumentFirst)
            .with_document(document())
            .apply(&mut pool)
            .unwrap();

        assert_eq!(pool, expected);
        assert!(report.applied().is_empty());
        assert_eq!(report.visited(), ["disk"]);
    }

    #[test]
    fn invalid_default_leaves_target_untouched() {
        let Value::Object(entries) = json!({ "name": "n", "disk": { "sizeGb": "ninety" } }) else {
            unreachable!()
        };
        let mut pool = Pool::default();

        let err = Defaulter::new(Precedence::DocumentFirst)
            .with_document(DefaultsDocument::from_map(entries))
            .apply(&mut pool)
            .expect_err("should fail");

        match err {
            ConfigError::InvalidDefault { path, kind, .. } => {
                assert_eq!(path, "disk.sizeGb");
                assert_eq!(kind, FieldKind::Integer);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool, Pool::default());
    }

    #[test]
    fn field_parsing_by_kind() {
        assert_eq!(i64::parse_default(" 90 "), Ok(90));
        assert!(u16::parse_default("-1").is_err());
        assert_eq!(u32::from_document(&json!(64514)), Ok(64514));
        assert!(i32::from_document(&json!(1.5)).is_err());
        assert!(i32::from_document(&json!(u64::MAX)).is_err());
        assert_eq!(i32::from_document(&json!("7")), Ok(7));
        assert_eq!(bool::parse_default("true"), Ok(true));
        assert!(bool::parse_default("yes").is_err());
        assert_eq!(bool::from_document(&json!("false")), Ok(false));
        assert_eq!(String::from_document(&json!(90)), Ok("90".to_owned()));
        assert!(String::from_document(&json!(["a"])).is_err());
        assert_eq!(f64::from_document(&json!(2)), Ok(2.0));
        assert_eq!(Option::<i64>::parse_default("3"), Ok(Some(3)));
        assert!(Option::<i64>::None.is_unset());
        assert!(!Some(0_i64).is_unset());
    }

    #[test]
    fn precedence_round_trips_through_text() {
        for precedence in [
            Precedence::DocumentFirst,
            Precedence::AnnotationFirst,
            Precedence::DocumentOnly,
            Precedence::AnnotationOnly,
        ] {
            assert_eq!(precedence.to_string().parse::<Precedence>().unwrap(), precedence);
        }
        assert!("sometimes".parse::<Precedence>().is_err());
    }
}
