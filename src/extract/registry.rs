use super::{CssExtractor, CssMode, CssParams, Extractor, LinkExtractor, LinkParams};
use crate::config::ExtractorConfig;
use crate::GraphError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Builds an extractor from its class name and TOML parameters
pub type ExtractorBuilder = fn(&str, &toml::Table) -> Result<Box<dyn Extractor>, GraphError>;

/// Maps extractor class names to builders
pub struct ExtractorRegistry {
    builders: HashMap<String, ExtractorBuilder>,
}

impl ExtractorRegistry {
    /// Creates a registry with no classes at all
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registers (or replaces) a class
    pub fn register(&mut self, class: impl Into<String>, builder: ExtractorBuilder) {
        self.builders.insert(class.into(), builder);
    }

    pub fn contains(&self, class: &str) -> bool {
        self.builders.contains_key(class)
    }

    /// Registered class names, sorted
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Builds a fresh extractor instance for one configuration entry
    pub fn build(&self, config: &ExtractorConfig) -> Result<Box<dyn Extractor>, GraphError> {
        let builder = self
            .builders
            .get(&config.class)
            .ok_or_else(|| GraphError::UnknownExtractorClass(config.class.clone()))?;
        builder(&config.class, &config.params)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("css_get", build_css_get);
        registry.register("css_getall", build_css_getall);
        registry.register("link_extractor", build_link_extractor);
        registry
    }
}

/// Decodes a parameter table into a typed parameter struct
pub fn decode_params<T: DeserializeOwned>(class: &str, params: &toml::Table) -> Result<T, GraphError> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| GraphError::InvalidParams {
            class: class.to_string(),
            message: e.to_string(),
        })
}

fn build_css_get(class: &str, params: &toml::Table) -> Result<Box<dyn Extractor>, GraphError> {
    let params: CssParams = decode_params(class, params)?;
    Ok(Box::new(CssExtractor::new(class, CssMode::First, params)?))
}

fn build_css_getall(class: &str, params: &toml::Table) -> Result<Box<dyn Extractor>, GraphError> {
    let params: CssParams = decode_params(class, params)?;
    Ok(Box::new(CssExtractor::new(class, CssMode::All, params)?))
}

fn build_link_extractor(class: &str, params: &toml::Table) -> Result<Box<dyn Extractor>, GraphError> {
    let params: LinkParams = decode_params(class, params)?;
    Ok(Box::new(LinkExtractor::new(class, params)?))
}
