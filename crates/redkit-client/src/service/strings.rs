//! String commands

use serde::Serialize;
use serde::de::DeserializeOwned;

use redkit_core::{Expiry, RedkitError, RedkitResult, Serializer, When, require_key};

use super::{RedisService, require_keys};
use crate::connection::Connector;

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Value stored at `key`, or `T::default()` when missing
    pub async fn string_get<T>(&self, key: &str) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payload: Option<String> = self.read(redis::cmd("GET").arg(key)).await?;
        self.decode(payload)
    }

    /// Values of several keys, in order; missing keys yield `T::default()`
    pub async fn string_get_many<T, Q>(&self, keys: &[Q]) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
        Q: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        require_keys("keys", keys)?;

        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key.as_ref());
        }
        let payloads: Vec<Option<String>> = self.read(&cmd).await?;
        self.serializer.deserialize_all(payloads)
    }

    /// Store a value; returns whether it was written under the precondition
    pub async fn string_set<T>(
        &self,
        key: &str,
        value: &T,
        expiry: Option<Expiry>,
        when: When,
    ) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(value)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(expiry) = expiry {
            // negative values are forwarded; the store rejects them
            cmd.arg("PX").arg(expiry.relative_millis());
        }
        match when {
            When::Always => {}
            When::Exists => {
                cmd.arg("XX");
            }
            When::NotExists => {
                cmd.arg("NX");
            }
        }

        let reply: Option<String> = self.write(&cmd).await?;
        Ok(reply.is_some())
    }

    /// Store several key/value pairs at once
    ///
    /// `When::NotExists` writes nothing unless every key is absent.
    pub async fn string_set_many<Q, T>(&self, pairs: &[(Q, T)], when: When) -> RedkitResult<bool>
    where
        Q: AsRef<str>,
        T: Serialize,
    {
        if pairs.is_empty() {
            return Ok(false);
        }
        let command = match when {
            When::Always => "MSET",
            When::NotExists => "MSETNX",
            When::Exists => {
                return Err(RedkitError::argument(
                    "when",
                    "multi-key set supports Always and NotExists only",
                ));
            }
        };

        let mut cmd = redis::cmd(command);
        for (key, value) in pairs {
            require_key("key", key.as_ref())?;
            cmd.arg(key.as_ref()).arg(self.encode(value)?);
        }

        match when {
            When::NotExists => self.write(&cmd).await,
            _ => {
                let _: () = self.write(&cmd).await?;
                Ok(true)
            }
        }
    }

    /// Replace the value and return the previous one
    pub async fn string_get_set<T, V>(&self, key: &str, value: &V) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
        V: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(value)?;
        let previous: Option<String> = self.write(redis::cmd("GETSET").arg(key).arg(payload)).await?;
        self.decode(previous)
    }

    /// Remove the key and return its value
    pub async fn string_get_delete<T>(&self, key: &str) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payload: Option<String> = self.write(redis::cmd("GETDEL").arg(key)).await?;
        self.decode(payload)
    }

    /// Increment an integer value, returning the new value
    pub async fn string_increment(&self, key: &str, by: i64) -> RedkitResult<i64> {
        require_key("key", key)?;
        self.write(redis::cmd("INCRBY").arg(key).arg(by)).await
    }

    /// Decrement an integer value, returning the new value
    pub async fn string_decrement(&self, key: &str, by: i64) -> RedkitResult<i64> {
        require_key("key", key)?;
        self.write(redis::cmd("DECRBY").arg(key).arg(by)).await
    }

    /// Increment a floating-point value, returning the new value
    pub async fn string_increment_float(&self, key: &str, by: f64) -> RedkitResult<f64> {
        require_key("key", key)?;
        self.write(redis::cmd("INCRBYFLOAT").arg(key).arg(by)).await
    }

    /// Decrement a floating-point value, returning the new value
    pub async fn string_decrement_float(&self, key: &str, by: f64) -> RedkitResult<f64> {
        self.string_increment_float(key, -by).await
    }

    /// Length of the stored payload in bytes
    pub async fn string_length(&self, key: &str) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(redis::cmd("STRLEN").arg(key)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use redis::Value;
    use redkit_testing::MockConnection;
    use serde::Deserialize;

    use super::super::test_support::service_with;
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        visits: u32,
    }

    #[tokio::test]
    async fn test_set_serializes_and_applies_options() {
        let mock = MockConnection::new().with_reply(Value::Okay);
        let service = service_with(&mock);
        let session = Session {
            user: "ada".to_string(),
            visits: 2,
        };

        let written = service
            .string_set(
                "session:1",
                &session,
                Some(Expiry::In(Duration::from_secs(30))),
                When::NotExists,
            )
            .await
            .unwrap();

        assert!(written);
        let command = mock.last_command().unwrap();
        assert_eq!(command.name(), "SET");
        assert_eq!(
            command.arguments(),
            ["session:1", r#"{"user":"ada","visits":2}"#, "PX", "30000", "NX"]
        );
    }

    #[tokio::test]
    async fn test_set_not_written_when_precondition_fails() {
        let mock = MockConnection::new().with_reply(Value::Nil);
        let service = service_with(&mock);
        let written = service.string_set("k", "v", None, When::Exists).await.unwrap();
        assert!(!written);
        assert_eq!(mock.last_command().unwrap().arguments(), ["k", "\"v\"", "XX"]);
    }

    #[tokio::test]
    async fn test_negative_expiry_is_forwarded() {
        let mock = MockConnection::new().with_reply(Value::Okay);
        let service = service_with(&mock);
        let past = chrono::Utc::now() - chrono::Duration::seconds(60);

        service
            .string_set("k", "v", Some(Expiry::At(past)), When::Always)
            .await
            .unwrap();

        let args = mock.last_command().unwrap().args;
        let millis: i64 = args[4].parse().unwrap();
        assert!(millis < 0);
    }

    #[tokio::test]
    async fn test_get_missing_value_is_default() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let session: Session = service.string_get("missing").await.unwrap();
        assert_eq!(session, Session::default());
        let maybe: Option<Session> = service.string_get("missing").await.unwrap();
        assert!(maybe.is_none());
    }

    #[tokio::test]
    async fn test_get_malformed_payload_is_serialization_error() {
        let mock = MockConnection::new().with_reply(Value::BulkString(b"{\"user\":".to_vec()));
        let service = service_with(&mock);
        let err = service.string_get::<Session>("k").await.unwrap_err();
        assert!(matches!(err, RedkitError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected_before_dispatch() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let err = service.string_get::<String>("").await.unwrap_err();
        assert!(err.is_argument_error());
        assert_eq!(mock.command_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_batches_short_circuit() {
        let mock = MockConnection::new();
        let service = service_with(&mock);

        let values: Vec<String> = service.string_get_many::<String, &str>(&[]).await.unwrap();
        assert!(values.is_empty());
        let pairs: [(&str, i32); 0] = [];
        assert!(!service.string_set_many(&pairs, When::Always).await.unwrap());

        assert_eq!(mock.command_count(), 0);
    }

    #[tokio::test]
    async fn test_set_many_uses_msetnx_and_rejects_exists() {
        let mock = MockConnection::new().with_reply(Value::Int(1));
        let service = service_with(&mock);

        let written = service
            .string_set_many(&[("a", 1), ("b", 2)], When::NotExists)
            .await
            .unwrap();
        assert!(written);
        assert_eq!(mock.last_command().unwrap().args, ["MSETNX", "a", "1", "b", "2"]);

        let err = service
            .string_set_many(&[("a", 1)], When::Exists)
            .await
            .unwrap_err();
        assert!(err.is_argument_error());
        assert_eq!(mock.command_count(), 1);
    }

    #[tokio::test]
    async fn test_get_many_keeps_positions() {
        let mock = MockConnection::new().with_reply(Value::Array(vec![
            Value::BulkString(b"\"x\"".to_vec()),
            Value::Nil,
        ]));
        let service = service_with(&mock);
        let values: Vec<String> = service.string_get_many(&["a", "b"]).await.unwrap();
        assert_eq!(values, vec!["x".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn test_float_decrement_negates() {
        let mock = MockConnection::new().with_reply(Value::BulkString(b"1.5".to_vec()));
        let service = service_with(&mock);
        let value = service.string_decrement_float("f", 0.5).await.unwrap();
        assert_eq!(value, 1.5);
        assert_eq!(mock.last_command().unwrap().args, ["INCRBYFLOAT", "f", "-0.5"]);
    }
}
