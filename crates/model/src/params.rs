use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sampling parameters sent along with a completion request.
///
/// This is a mapping from parameter name to value. Keys are unique and
/// the last write wins. Well-known parameters have typed accessors, any
/// other provider-specific parameter can be stored with [`set`].
///
/// [`set`]: GenerationParams::set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationParams(BTreeMap<String, Value>);

impl GenerationParams {
    /// Key of the model identifier.
    pub const MODEL: &'static str = "model";
    /// Key of the sampling temperature.
    pub const TEMPERATURE: &'static str = "temperature";
    /// Key of the nucleus-sampling threshold.
    pub const TOP_P: &'static str = "top_p";
    /// Key of the frequency penalty.
    pub const FREQUENCY_PENALTY: &'static str = "frequency_penalty";
    /// Key of the presence penalty.
    pub const PRESENCE_PENALTY: &'static str = "presence_penalty";
    /// Key of the maximum output length, in tokens.
    pub const MAX_TOKENS: &'static str = "max_tokens";
    /// Key of the number of candidate completions.
    pub const N: &'static str = "n";

    /// Creates an empty parameter set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a parameter.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a parameter, returning the previous value if any.
    #[inline]
    pub fn set<K: Into<String>, V: Into<Value>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Sets a parameter and returns `self`, for chaining.
    #[inline]
    pub fn with<K: Into<String>, V: Into<Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Removes a parameter.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copies every parameter of `other` into `self`. Values in `other`
    /// override the existing ones.
    pub fn merge(&mut self, other: &GenerationParams) {
        for (key, value) in other.iter() {
            self.0.insert(key.to_owned(), value.clone());
        }
    }

    /// Returns `true` if the parameter is set.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no parameter is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the parameters in key order.
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Returns the selected model identifier.
    #[inline]
    pub fn model(&self) -> Option<&str> {
        self.get(Self::MODEL).and_then(Value::as_str)
    }

    /// Selects the model.
    #[inline]
    pub fn with_model<S: Into<String>>(self, model: S) -> Self {
        self.with(Self::MODEL, model.into())
    }

    /// Returns the sampling temperature.
    #[inline]
    pub fn temperature(&self) -> Option<f64> {
        self.get(Self::TEMPERATURE).and_then(Value::as_f64)
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(self, temperature: f64) -> Self {
        self.with(Self::TEMPERATURE, temperature)
    }

    /// Returns the nucleus-sampling threshold.
    #[inline]
    pub fn top_p(&self) -> Option<f64> {
        self.get(Self::TOP_P).and_then(Value::as_f64)
    }

    /// Sets the nucleus-sampling threshold.
    #[inline]
    pub fn with_top_p(self, top_p: f64) -> Self {
        self.with(Self::TOP_P, top_p)
    }

    /// Returns the frequency penalty.
    #[inline]
    pub fn frequency_penalty(&self) -> Option<f64> {
        self.get(Self::FREQUENCY_PENALTY).and_then(Value::as_f64)
    }

    /// Sets the frequency penalty.
    #[inline]
    pub fn with_frequency_penalty(self, penalty: f64) -> Self {
        self.with(Self::FREQUENCY_PENALTY, penalty)
    }

    /// Returns the presence penalty.
    #[inline]
    pub fn presence_penalty(&self) -> Option<f64> {
        self.get(Self::PRESENCE_PENALTY).and_then(Value::as_f64)
    }

    /// Sets the presence penalty.
    #[inline]
    pub fn with_presence_penalty(self, penalty: f64) -> Self {
        self.with(Self::PRESENCE_PENALTY, penalty)
    }

    /// Returns the maximum output length.
    #[inline]
    pub fn max_tokens(&self) -> Option<u64> {
        self.get(Self::MAX_TOKENS).and_then(Value::as_u64)
    }

    /// Sets the maximum output length.
    #[inline]
    pub fn with_max_tokens(self, max_tokens: u64) -> Self {
        self.with(Self::MAX_TOKENS, max_tokens)
    }

    /// Returns the number of candidate completions.
    #[inline]
    pub fn n(&self) -> Option<u64> {
        self.get(Self::N).and_then(Value::as_u64)
    }

    /// Sets the number of candidate completions.
    #[inline]
    pub fn with_n(self, n: u64) -> Self {
        self.with(Self::N, n)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)>
    for GenerationParams
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for GenerationParams {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a GenerationParams {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut params = GenerationParams::new()
            .with_model("curie")
            .with_temperature(0.5);
        params.set("temperature", 0.9);
        params.set("model", "davinci");
        assert_eq!(params.len(), 2);
        assert_eq!(params.model(), Some("davinci"));
        assert_eq!(params.temperature(), Some(0.9));
    }

    #[test]
    fn test_merge() {
        let mut base = GenerationParams::new().with_max_tokens(150).with_n(1);
        let overrides = GenerationParams::new()
            .with_max_tokens(20)
            .with("logit_bias", json!({ "50256": -100 }));
        base.merge(&overrides);
        assert_eq!(base.max_tokens(), Some(20));
        assert_eq!(base.n(), Some(1));
        assert_eq!(base.get("logit_bias"), Some(&json!({ "50256": -100 })));
    }

    #[test]
    fn test_serialize_flat() {
        let params: GenerationParams =
            [("model", json!("davinci")), ("top_p", json!(1.0))]
                .into_iter()
                .collect();
        let serialized = serde_json::to_value(&params).unwrap();
        assert_eq!(serialized, json!({ "model": "davinci", "top_p": 1.0 }));

        let deserialized: GenerationParams =
            serde_json::from_value(serialized).unwrap();
        assert_eq!(deserialized, params);
    }

    #[test]
    fn test_typed_accessors_ignore_wrong_types() {
        let params = GenerationParams::new()
            .with("max_tokens", "lots")
            .with("model", 3);
        assert_eq!(params.max_tokens(), None);
        assert_eq!(params.model(), None);
    }
}
