use serde::{Deserialize, Serialize};

use crate::{KeyValue, ModelError};

/// Environment variables exported to every launched process.
///
/// Internally stored as an ordered list of key–value pairs and serialized as a transparent array wrapper.
/// Keys are unique: pushing an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentSpec(Vec<KeyValue>);

impl EnvironmentSpec {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a flat string of whitespace-separated `KEY=VALUE` tokens.
    ///
    /// The value is everything after the first `=` and may itself contain `=` or be empty.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let mut env = Self::new();
        for token in s.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ModelError::InvalidEnvToken(token.to_string()))?;
            if key.is_empty() {
                return Err(ModelError::EmptyEnvKey(token.to_string()));
            }
            if !is_valid_key(key) {
                return Err(ModelError::InvalidEnvKey(key.to_string()));
            }
            env.push(key, value);
        }
        Ok(env)
    }

    /// First key that is not a portable shell variable name, if any.
    ///
    /// `parse` never yields one, but `push` and deserialization do not check.
    pub fn invalid_key(&self) -> Option<&str> {
        self.0.iter().map(|kv| kv.key()).find(|k| !is_valid_key(k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key–value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|kv| kv.key() == key).map(|kv| kv.value())
    }

    /// Set a variable; an existing key keeps its position and takes the new value.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let kv = KeyValue::new(key, value);
        match self.0.iter_mut().find(|e| e.key() == kv.key()) {
            Some(slot) => *slot = kv,
            None => self.0.push(kv),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the names every POSIX shell can `export`.
fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_glog_style_string() {
        let env = EnvironmentSpec::parse(
            "GLOG_logtostderr=true GLOG_v=-1 GLOG_minloglevel=0 \
             LIBHDFS3_CONF=/data/opt/hadoop/etc/hadoop/hdfs-site.xml",
        )
        .unwrap();

        assert_eq!(env.len(), 4);
        assert_eq!(env.get("GLOG_v"), Some("-1"));
        assert_eq!(
            env.get("LIBHDFS3_CONF"),
            Some("/data/opt/hadoop/etc/hadoop/hdfs-site.xml")
        );
        let keys: Vec<_> = env.iter().map(|kv| kv.key()).collect();
        assert_eq!(keys, vec!["GLOG_logtostderr", "GLOG_v", "GLOG_minloglevel", "LIBHDFS3_CONF"]);
    }

    #[test]
    fn parse_empty_string_is_empty_env() {
        assert!(EnvironmentSpec::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn value_may_contain_equals_or_be_empty() {
        let env = EnvironmentSpec::parse("OPTS=a=b EMPTY=").unwrap();
        assert_eq!(env.get("OPTS"), Some("a=b"));
        assert_eq!(env.get("EMPTY"), Some(""));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(
            EnvironmentSpec::parse("GOOD=1 bad"),
            Err(ModelError::InvalidEnvToken("bad".into()))
        );
        assert_eq!(
            EnvironmentSpec::parse("=x"),
            Err(ModelError::EmptyEnvKey("=x".into()))
        );
    }

    #[test]
    fn rejects_keys_a_shell_cannot_export() {
        assert_eq!(
            EnvironmentSpec::parse("A-B=1"),
            Err(ModelError::InvalidEnvKey("A-B".into()))
        );
        assert_eq!(
            EnvironmentSpec::parse("X$(touch${IFS}/tmp/p)=1"),
            Err(ModelError::InvalidEnvKey("X$(touch${IFS}/tmp/p)".into()))
        );
        assert_eq!(
            EnvironmentSpec::parse("9LIVES=1"),
            Err(ModelError::InvalidEnvKey("9LIVES".into()))
        );
        assert!(EnvironmentSpec::parse("_OK=1 lower_case2=x").is_ok());
    }

    #[test]
    fn invalid_key_spots_pushed_names() {
        let mut env = EnvironmentSpec::parse("GLOG_v=-1").unwrap();
        assert_eq!(env.invalid_key(), None);
        env.push("BAD NAME", "1");
        assert_eq!(env.invalid_key(), Some("BAD NAME"));
    }

    #[test]
    fn repeated_key_last_wins_in_place() {
        let env = EnvironmentSpec::parse("A=1 B=2 A=3").unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("A"), Some("3"));
        assert_eq!(env.iter().next().map(|kv| kv.key()), Some("A"));
    }

    #[test]
    fn serde_transparent_roundtrip_json() {
        let env = EnvironmentSpec::parse("FOO=bar").unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"key\":\"FOO\""));

        let back: EnvironmentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
