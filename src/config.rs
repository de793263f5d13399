use crate::error::ConfigError;
use crate::selector::DEFAULT_XPATH_PREFIX;

/// Options for module assembly.
///
/// # Examples
///
/// ```
/// use ssc_gen::config::BuildOptions;
///
/// let options = BuildOptions::default().css_to_xpath(true);
/// assert!(options.validate().is_ok());
/// assert!(options.xpath_to_css(true).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Emit the module docstring and per-struct output signatures
    pub gen_docstring: bool,
    /// Rewrite every CSS query into XPath
    pub css_to_xpath: bool,
    /// Rewrite every XPath query into CSS
    pub xpath_to_css: bool,
    /// Axis prepended to queries produced by the CSS → XPath rewrite
    pub xpath_prefix: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            gen_docstring: true,
            css_to_xpath: false,
            xpath_to_css: false,
            xpath_prefix: DEFAULT_XPATH_PREFIX.to_string(),
        }
    }
}

impl BuildOptions {
    pub fn gen_docstring(mut self, on: bool) -> Self {
        self.gen_docstring = on;
        self
    }

    pub fn css_to_xpath(mut self, on: bool) -> Self {
        self.css_to_xpath = on;
        self
    }

    pub fn xpath_to_css(mut self, on: bool) -> Self {
        self.xpath_to_css = on;
        self
    }

    pub fn xpath_prefix(mut self, prefix: &str) -> Self {
        self.xpath_prefix = prefix.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.css_to_xpath && self.xpath_to_css {
            return Err(ConfigError::ConflictingConversions);
        }
        if self.css_to_xpath && self.xpath_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyXpathPrefix);
        }
        Ok(())
    }
}
