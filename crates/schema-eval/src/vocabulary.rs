// Vocabulary gate: which keywords apply under a dialect

use crate::error::{SchemaError, SchemaResult};
use crate::keywords::{Keyword, VocabularyKeyword};
use crate::options::EvaluationOptions;
use crate::registry::SchemaRegistry;
use crate::schema::Schema;
use crate::spec_version::SpecVersion;

/// Published vocabulary URIs
pub mod vocab {
    pub const CORE_2019: &str = "https://json-schema.org/draft/2019-09/vocab/core";
    pub const APPLICATOR_2019: &str = "https://json-schema.org/draft/2019-09/vocab/applicator";
    pub const VALIDATION_2019: &str = "https://json-schema.org/draft/2019-09/vocab/validation";
    pub const META_DATA_2019: &str = "https://json-schema.org/draft/2019-09/vocab/meta-data";
    pub const FORMAT_2019: &str = "https://json-schema.org/draft/2019-09/vocab/format";
    pub const CONTENT_2019: &str = "https://json-schema.org/draft/2019-09/vocab/content";

    pub const CORE_2020: &str = "https://json-schema.org/draft/2020-12/vocab/core";
    pub const APPLICATOR_2020: &str = "https://json-schema.org/draft/2020-12/vocab/applicator";
    pub const UNEVALUATED_2020: &str = "https://json-schema.org/draft/2020-12/vocab/unevaluated";
    pub const VALIDATION_2020: &str = "https://json-schema.org/draft/2020-12/vocab/validation";
    pub const META_DATA_2020: &str = "https://json-schema.org/draft/2020-12/vocab/meta-data";
    pub const FORMAT_ANNOTATION_2020: &str =
        "https://json-schema.org/draft/2020-12/vocab/format-annotation";
    pub const FORMAT_ASSERTION_2020: &str =
        "https://json-schema.org/draft/2020-12/vocab/format-assertion";
    pub const CONTENT_2020: &str = "https://json-schema.org/draft/2020-12/vocab/content";

    // Keyword groups, as returned by `Keyword::vocabularies`
    pub const CORE: &[&str] = &[CORE_2019, CORE_2020];
    pub const APPLICATOR: &[&str] = &[APPLICATOR_2019, APPLICATOR_2020];
    pub const UNEVALUATED: &[&str] = &[APPLICATOR_2019, UNEVALUATED_2020];
    pub const VALIDATION: &[&str] = &[VALIDATION_2019, VALIDATION_2020];
    pub const META_DATA: &[&str] = &[META_DATA_2019, META_DATA_2020];
    pub const FORMAT: &[&str] = &[FORMAT_2019, FORMAT_ANNOTATION_2020, FORMAT_ASSERTION_2020];
    pub const CONTENT: &[&str] = &[CONTENT_2019, CONTENT_2020];

    pub const KNOWN: &[&str] = &[
        CORE_2019,
        APPLICATOR_2019,
        VALIDATION_2019,
        META_DATA_2019,
        FORMAT_2019,
        CONTENT_2019,
        CORE_2020,
        APPLICATOR_2020,
        UNEVALUATED_2020,
        VALIDATION_2020,
        META_DATA_2020,
        FORMAT_ANNOTATION_2020,
        FORMAT_ASSERTION_2020,
        CONTENT_2020,
    ];

    pub fn is_known(uri: &str) -> bool {
        KNOWN.contains(&uri)
    }
}

/// Custom meta-schemas may chain; deeper chains fall back to the default draft
const MAX_META_SCHEMA_DEPTH: usize = 16;

/// The dialect a schema is compiled under: a draft plus an optional explicit
/// vocabulary set.
///
/// Part of the compiled-graph cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialectSignature {
    version: SpecVersion,
    vocabularies: Option<Vec<String>>,
}

impl DialectSignature {
    pub fn new(version: SpecVersion) -> Self {
        Self {
            version,
            vocabularies: None,
        }
    }

    /// Restrict to an explicit vocabulary set
    pub fn with_vocabularies<I, S>(version: SpecVersion, vocabularies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = vocabularies.into_iter().map(Into::into).collect();
        set.sort();
        set.dedup();
        Self {
            version,
            vocabularies: Some(set),
        }
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    pub fn vocabularies(&self) -> Option<&[String]> {
        self.vocabularies.as_deref()
    }

    /// Whether `format` is an assertion by vocabulary
    pub fn format_assertion(&self) -> bool {
        self.vocabularies
            .as_ref()
            .is_some_and(|set| set.iter().any(|v| v == vocab::FORMAT_ASSERTION_2020))
    }

    /// Determine the dialect for `root`.
    ///
    /// `evaluate_as` wins, then a known `$schema`, then a registered custom
    /// meta-schema (which may also restrict vocabularies), then the default.
    pub fn resolve(root: &Schema, options: &EvaluationOptions) -> SchemaResult<Self> {
        if options.evaluate_as != SpecVersion::Unspecified {
            tracing::debug!(version = %options.evaluate_as, "dialect forced by options");
            return Ok(Self::new(options.evaluate_as));
        }

        let mut version = None;
        let mut vocabularies = None;
        if let Some(uri) = root.declared_dialect() {
            match SpecVersion::from_meta_schema_uri(uri) {
                Some(known) => version = Some(known),
                None => {
                    let (meta_version, meta_vocabularies) =
                        resolve_meta_schema(uri, options.registry(), 0)?;
                    version = meta_version;
                    vocabularies = meta_vocabularies;
                }
            }
        }

        let version = version.unwrap_or(SpecVersion::DEFAULT);
        Ok(match vocabularies {
            Some(set) => Self::with_vocabularies(version, set),
            None => Self::new(version),
        })
    }

    /// Whether `keyword` applies under this dialect
    pub fn is_active(&self, keyword: &dyn Keyword) -> bool {
        if !keyword.spec_versions().contains(self.version) {
            return false;
        }
        match &self.vocabularies {
            None => true,
            Some(active) => {
                let declared = keyword.vocabularies();
                declared.is_empty() || declared.iter().any(|v| active.iter().any(|a| a == v))
            }
        }
    }

    /// The keywords of `schema` that apply, in compile order
    pub fn active_keywords<'s>(&self, schema: &'s Schema) -> Vec<&'s dyn Keyword> {
        let mut active: Vec<&dyn Keyword> = schema
            .keywords()
            .iter()
            .map(|k| k.as_ref())
            .filter(|k| self.is_active(*k))
            .collect();

        if self.version.ref_overrides_siblings() && active.iter().any(|k| k.name() == "$ref") {
            active.retain(|k| k.name() == "$ref");
        }

        // Stable: equal priorities keep declaration order
        active.sort_by_key(|k| k.priority());
        active
    }
}

fn resolve_meta_schema(
    uri: &str,
    registry: &SchemaRegistry,
    depth: usize,
) -> SchemaResult<(Option<SpecVersion>, Option<Vec<String>>)> {
    if depth > MAX_META_SCHEMA_DEPTH {
        return Ok((None, None));
    }
    let meta = registry
        .resolve(uri)
        .ok_or_else(|| SchemaError::UnresolvedMetaSchema(uri.to_string()))?;

    let mut vocabularies = match meta.keyword_as::<VocabularyKeyword>("$vocabulary") {
        Some(declared) => {
            let mut known = Vec::new();
            for (id, required) in declared.entries() {
                if vocab::is_known(id) {
                    known.push(id.clone());
                } else if *required {
                    return Err(SchemaError::UnknownVocabulary(id.clone()));
                }
            }
            Some(known)
        }
        None => None,
    };

    let mut version = None;
    if let Some(parent) = meta.declared_dialect()
        && parent != uri
    {
        match SpecVersion::from_meta_schema_uri(parent) {
            Some(known) => version = Some(known),
            None => {
                let (parent_version, parent_vocabularies) =
                    resolve_meta_schema(parent, registry, depth + 1)?;
                version = parent_version;
                if vocabularies.is_none() {
                    vocabularies = parent_vocabularies;
                }
            }
        }
    }

    tracing::debug!(
        meta_schema = uri,
        version = ?version,
        vocabularies = vocabularies.as_ref().map(Vec::len),
        "resolved custom meta-schema"
    );
    Ok((version, vocabularies))
}
