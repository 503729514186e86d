//! Metadata-locked entry point.
//!
//! An [`ODataClient`] holds one compiled schema plus the render and
//! validation options, and turns query trees into query-string text.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::query::{
    compile, gate, validate_with, Input, QueryBuilder, QueryError, QuerySpec, RenderOptions,
    Target, ValidateOptions,
};
use crate::schema::{SchemaError, SchemaSource, ServiceMetadata};

/// Query generator bound to a service schema.
#[derive(Clone, Debug, Default)]
pub struct ODataClient {
    metadata: Option<Arc<ServiceMetadata>>,
    render: RenderOptions,
    validation: ValidateOptions,
}

impl ODataClient {
    /// Client without a schema; only metadata-free targets can be validated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client bound to `metadata`.
    pub fn with_metadata(metadata: impl Into<Arc<ServiceMetadata>>) -> Self {
        Self {
            metadata: Some(metadata.into()),
            ..Self::default()
        }
    }

    /// Loads the first schema of `source` and binds to it.
    pub fn from_source(source: impl Into<SchemaSource>) -> Result<Self, SchemaError> {
        let metadata = source.into().load_first()?;
        Ok(Self::with_metadata(metadata))
    }

    /// Applies the render and validation settings from `config`.
    pub fn configured(mut self, config: &Config) -> Self {
        self.render = config.render();
        self.validation = config.validation();
        self
    }

    /// Replaces the render options.
    pub fn render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Replaces the validation options.
    pub fn validate_options(mut self, validation: ValidateOptions) -> Self {
        self.validation = validation;
        self
    }

    /// Bound schema, if any.
    pub fn metadata(&self) -> Option<&ServiceMetadata> {
        self.metadata.as_deref()
    }

    /// Starts a query against `target` bound to this client.
    pub fn query(&self, target: Target) -> ClientQuery<'_> {
        ClientQuery {
            client: self,
            builder: QueryBuilder::new(target),
        }
    }

    /// Starts a query against the entity set `entity_set`.
    pub fn collection(&self, entity_set: impl Into<String>) -> ClientQuery<'_> {
        self.query(Target::collection(entity_set))
    }

    /// Gates and validates `spec`, returning the rewritten tree.
    ///
    /// Targets that need no schema pass through unchanged when the client
    /// has none; the others fail with [`QueryError::MetadataRequired`].
    pub fn prepare(&self, spec: &QuerySpec) -> Result<QuerySpec, QueryError> {
        self.checked(spec).map(Cow::into_owned)
    }

    fn checked<'s>(&self, spec: &'s QuerySpec) -> Result<Cow<'s, QuerySpec>, QueryError> {
        gate(spec)?;
        let target = spec.target.as_ref().ok_or(QueryError::MissingTarget)?;
        match &self.metadata {
            Some(metadata) => Ok(Cow::Owned(validate_with(spec, metadata, &self.validation)?)),
            None if target.requires_metadata() => Err(QueryError::MetadataRequired {
                target: target.describe(),
            }),
            None => Ok(Cow::Borrowed(spec)),
        }
    }

    /// Renders `spec`, validating it first when `validate` is set.
    pub fn generate(&self, spec: &QuerySpec, validate: bool) -> Result<String, QueryError> {
        let spec = if validate {
            self.checked(spec)?
        } else {
            Cow::Borrowed(spec)
        };
        let rendered = compile(&spec, &self.render)?;
        debug!(validated = validate, length = rendered.len(), "query generated");
        Ok(rendered)
    }
}

/// Query under construction, bound to the client that will render it.
#[derive(Clone, Debug)]
pub struct ClientQuery<'c> {
    client: &'c ODataClient,
    builder: QueryBuilder,
}

impl<'c> ClientQuery<'c> {
    fn map(self, f: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        Self {
            client: self.client,
            builder: f(self.builder),
        }
    }

    /// See [`QueryBuilder::select`].
    pub fn select<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        self.map(|b| b.select(fields))
    }

    /// See [`QueryBuilder::filter`].
    pub fn filter<I>(self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        self.map(|b| b.filter(items))
    }

    /// See [`QueryBuilder::or_filter`].
    pub fn or_filter<I>(self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        self.map(|b| b.or_filter(items))
    }

    /// See [`QueryBuilder::orderby`].
    pub fn orderby<I>(self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        self.map(|b| b.orderby(items))
    }

    /// See [`QueryBuilder::skip`].
    pub fn skip(self, n: i64) -> Self {
        self.map(|b| b.skip(n))
    }

    /// See [`QueryBuilder::top`].
    pub fn top(self, n: i64) -> Self {
        self.map(|b| b.top(n))
    }

    /// See [`QueryBuilder::count`].
    pub fn count(self, enabled: bool) -> Self {
        self.map(|b| b.count(enabled))
    }

    /// See [`QueryBuilder::expand`].
    pub fn expand(self, navigation: impl Into<String>) -> Self {
        self.map(|b| b.expand(navigation))
    }

    /// See [`QueryBuilder::expand_with`].
    pub fn expand_with<S, F>(self, navigation: S, build: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.map(|b| b.expand_with(navigation, build))
    }

    /// Built query tree, unvalidated.
    pub fn finish(self) -> Result<QuerySpec, QueryError> {
        self.builder.finish()
    }

    /// Builds, validates and renders.
    pub fn generate(self) -> Result<String, QueryError> {
        self.generate_with(true)
    }

    /// Builds and renders, validating only when `validate` is set.
    pub fn generate_with(self, validate: bool) -> Result<String, QueryError> {
        let client = self.client;
        let spec = self.builder.finish()?;
        client.generate(&spec, validate)
    }
}
