//! List commands

use serde::Serialize;
use serde::de::DeserializeOwned;

use redkit_core::{
    ListSide, PageRange, RedkitError, RedkitResult, Serializer, When, require_key,
};

use super::RedisService;
use crate::connection::Connector;

pub(super) fn push_command(side: ListSide, when: When) -> RedkitResult<&'static str> {
    match (side, when) {
        (ListSide::Left, When::Always) => Ok("LPUSH"),
        (ListSide::Left, When::Exists) => Ok("LPUSHX"),
        (ListSide::Right, When::Always) => Ok("RPUSH"),
        (ListSide::Right, When::Exists) => Ok("RPUSHX"),
        (_, When::NotExists) => Err(RedkitError::argument(
            "when",
            "list push supports Always and Exists only",
        )),
    }
}

impl<K: Connector, S: Serializer> RedisService<K, S> {
    async fn list_push<T>(&self, side: ListSide, key: &str, value: &T, when: When) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let command = push_command(side, when)?;
        let payload = self.encode(value)?;
        self.write(redis::cmd(command).arg(key).arg(payload)).await
    }

    async fn list_push_many<T: Serialize>(&self, side: ListSide, key: &str, values: &[T]) -> RedkitResult<u64> {
        require_key("key", key)?;
        if values.is_empty() {
            return Ok(0);
        }
        let payloads = self.serializer.serialize_all(values)?;
        self.write(redis::cmd(push_command(side, When::Always)?).arg(key).arg(payloads))
            .await
    }

    async fn list_pop<T>(&self, side: ListSide, key: &str) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let command = match side {
            ListSide::Left => "LPOP",
            ListSide::Right => "RPOP",
        };
        let payload: Option<String> = self.write(redis::cmd(command).arg(key)).await?;
        self.decode(payload)
    }

    /// Prepend a value; returns the new length (0 when `Exists` found no list)
    pub async fn list_left_push<T>(&self, key: &str, value: &T, when: When) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        self.list_push(ListSide::Left, key, value, when).await
    }

    /// Append a value; returns the new length (0 when `Exists` found no list)
    pub async fn list_right_push<T>(&self, key: &str, value: &T, when: When) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        self.list_push(ListSide::Right, key, value, when).await
    }

    pub async fn list_left_push_many<T: Serialize>(&self, key: &str, values: &[T]) -> RedkitResult<u64> {
        self.list_push_many(ListSide::Left, key, values).await
    }

    pub async fn list_right_push_many<T: Serialize>(&self, key: &str, values: &[T]) -> RedkitResult<u64> {
        self.list_push_many(ListSide::Right, key, values).await
    }

    pub async fn list_left_pop<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<T> {
        self.list_pop(ListSide::Left, key).await
    }

    pub async fn list_right_pop<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<T> {
        self.list_pop(ListSide::Right, key).await
    }

    pub async fn list_length(&self, key: &str) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(redis::cmd("LLEN").arg(key)).await
    }

    /// Elements between two inclusive indexes; negative indexes count from the end
    pub async fn list_range<T>(&self, key: &str, start: i64, stop: i64) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payloads: Vec<String> = self.read(redis::cmd("LRANGE").arg(key).arg(start).arg(stop)).await?;
        self.decode_all(payloads)
    }

    pub async fn list_all<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<Vec<T>> {
        self.list_range(key, 0, -1).await
    }

    /// One page of the list, pages numbered from 1
    pub async fn list_page<T>(&self, key: &str, page: i64, page_size: i64) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        let range = PageRange::new(page, page_size)?;
        self.list_range(key, range.start, range.stop).await
    }

    pub async fn list_get_by_index<T>(&self, key: &str, index: i64) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payload: Option<String> = self.read(redis::cmd("LINDEX").arg(key).arg(index)).await?;
        self.decode(payload)
    }

    pub async fn list_set_by_index<T>(&self, key: &str, index: i64, value: &T) -> RedkitResult<()>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(value)?;
        self.write(redis::cmd("LSET").arg(key).arg(index).arg(payload)).await
    }

    /// Insert before the first occurrence of `pivot`
    ///
    /// Returns the new length, `-1` when the pivot is absent, `0` for a missing list.
    pub async fn list_insert_before<P, T>(&self, key: &str, pivot: &P, value: &T) -> RedkitResult<i64>
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        self.list_insert(key, "BEFORE", pivot, value).await
    }

    /// Insert after the first occurrence of `pivot`
    pub async fn list_insert_after<P, T>(&self, key: &str, pivot: &P, value: &T) -> RedkitResult<i64>
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        self.list_insert(key, "AFTER", pivot, value).await
    }

    async fn list_insert<P, T>(&self, key: &str, position: &str, pivot: &P, value: &T) -> RedkitResult<i64>
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let pivot = self.encode(pivot)?;
        let payload = self.encode(value)?;
        self.write(redis::cmd("LINSERT").arg(key).arg(position).arg(pivot).arg(payload))
            .await
    }

    /// Remove occurrences of a value
    ///
    /// `count > 0` removes from the head, `count < 0` from the tail, `0` all.
    pub async fn list_remove<T>(&self, key: &str, value: &T, count: i64) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(value)?;
        self.write(redis::cmd("LREM").arg(key).arg(count).arg(payload)).await
    }

    /// Keep only the elements between two inclusive indexes
    pub async fn list_trim(&self, key: &str, start: i64, stop: i64) -> RedkitResult<()> {
        require_key("key", key)?;
        self.write(redis::cmd("LTRIM").arg(key).arg(start).arg(stop)).await
    }

    /// Pop from one list and push onto another, returning the moved element
    pub async fn list_move<T>(
        &self,
        source: &str,
        destination: &str,
        from: ListSide,
        to: ListSide,
    ) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("source", source)?;
        require_key("destination", destination)?;
        let payload: Option<String> = self
            .write(
                redis::cmd("LMOVE")
                    .arg(source)
                    .arg(destination)
                    .arg(from.as_str())
                    .arg(to.as_str()),
            )
            .await?;
        self.decode(payload)
    }

    pub async fn list_remove_all(&self, key: &str) -> RedkitResult<bool> {
        self.key_delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use redis::Value;
    use redkit_testing::MockConnection;

    use super::super::test_support::service_with;
    use super::*;

    #[tokio::test]
    async fn test_page_two_of_three_reads_ranks_three_to_five() {
        let mock = MockConnection::new().with_reply(Value::Array(vec![]));
        let service = service_with(&mock);
        let page: Vec<String> = service.list_page("l", 2, 3).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(mock.last_command().unwrap().args, ["LRANGE", "l", "3", "5"]);
    }

    #[tokio::test]
    async fn test_invalid_page_is_rejected() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let err = service.list_page::<String>("l", 0, 10).await.unwrap_err();
        assert!(err.is_argument_error());
        assert_eq!(mock.command_count(), 0);
    }

    #[tokio::test]
    async fn test_push_variants() {
        let mock = MockConnection::new()
            .with_reply(Value::Int(1))
            .with_reply(Value::Int(0));
        let service = service_with(&mock);

        assert_eq!(service.list_left_push("l", &1, When::Always).await.unwrap(), 1);
        assert_eq!(service.list_right_push("l", &2, When::Exists).await.unwrap(), 0);
        let names: Vec<_> = mock.commands().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["LPUSH", "RPUSHX"]);

        let err = service.list_left_push("l", &3, When::NotExists).await.unwrap_err();
        assert!(err.is_argument_error());
    }

    #[tokio::test]
    async fn test_push_many_empty_short_circuits() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let none: [u32; 0] = [];
        assert_eq!(service.list_right_push_many("l", &none).await.unwrap(), 0);
        assert_eq!(mock.command_count(), 0);
    }

    #[tokio::test]
    async fn test_push_many_blank_key_fails_even_when_empty() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let none: [u32; 0] = [];
        let err = service.list_left_push_many("", &none).await.unwrap_err();
        assert!(err.is_argument_error());
        assert_eq!(mock.command_count(), 0);
    }

    #[tokio::test]
    async fn test_push_many_sends_every_value() {
        let mock = MockConnection::new().with_reply(Value::Int(3));
        let service = service_with(&mock);
        service.list_right_push_many("l", &["a", "b", "c"]).await.unwrap();
        assert_eq!(
            mock.last_command().unwrap().args,
            ["RPUSH", "l", "\"a\"", "\"b\"", "\"c\""]
        );
    }

    #[tokio::test]
    async fn test_pop_missing_is_default() {
        let mock = MockConnection::new();
        let service = service_with(&mock);
        let value: Option<u32> = service.list_left_pop("l").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_move_between_lists() {
        let mock = MockConnection::new().with_reply(Value::BulkString(b"7".to_vec()));
        let service = service_with(&mock);
        let moved: u32 = service
            .list_move("src", "dst", ListSide::Right, ListSide::Left)
            .await
            .unwrap();
        assert_eq!(moved, 7);
        assert_eq!(
            mock.last_command().unwrap().args,
            ["LMOVE", "src", "dst", "RIGHT", "LEFT"]
        );
    }

    #[tokio::test]
    async fn test_insert_and_remove_serialize_pivots() {
        let mock = MockConnection::new()
            .with_reply(Value::Int(3))
            .with_reply(Value::Int(1));
        let service = service_with(&mock);
        service.list_insert_after("l", "a", "b").await.unwrap();
        service.list_remove("l", "b", 0).await.unwrap();

        let commands = mock.commands();
        assert_eq!(commands[0].args, ["LINSERT", "l", "AFTER", "\"a\"", "\"b\""]);
        assert_eq!(commands[1].args, ["LREM", "l", "0", "\"b\""]);
    }
}
