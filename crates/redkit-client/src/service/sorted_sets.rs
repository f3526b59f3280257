//! Sorted-set commands
//!
//! Ranks are 0-based in ascending score order unless an [`Order`] says
//! otherwise. Score ranges are expressed with [`ScoreRange`], whose
//! exclusivity becomes the store's `(` bound prefix.

use serde::Serialize;
use serde::de::DeserializeOwned;

use redkit_core::{
    Aggregate, Order, PageRange, RedkitError, RedkitResult, ScoreRange, Serializer,
    SetOperation, SortedSetEntry, When, require_key,
};

use super::{RedisService, require_keys};
use crate::connection::Connector;

fn add_command<'a>(cmd: &'a mut redis::Cmd, key: &str, when: When) -> &'a mut redis::Cmd {
    cmd.arg(key);
    match when {
        When::Always => cmd,
        When::Exists => cmd.arg("XX"),
        When::NotExists => cmd.arg("NX"),
    }
}

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Add a member or update its score; returns whether the member was new
    pub async fn sorted_set_add<T>(&self, key: &str, member: &T, score: f64, when: When) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        let mut cmd = redis::cmd("ZADD");
        add_command(&mut cmd, key, when).arg(score).arg(payload);
        self.write(&cmd).await
    }

    /// Add several members; returns how many were new
    pub async fn sorted_set_add_many<T: Serialize>(
        &self,
        key: &str,
        entries: &[SortedSetEntry<T>],
        when: When,
    ) -> RedkitResult<u64> {
        require_key("key", key)?;
        if entries.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZADD");
        add_command(&mut cmd, key, when);
        for entry in entries {
            cmd.arg(entry.score).arg(self.encode(&entry.member)?);
        }
        self.write(&cmd).await
    }

    pub async fn sorted_set_remove<T>(&self, key: &str, member: &T) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.write(redis::cmd("ZREM").arg(key).arg(payload)).await
    }

    pub async fn sorted_set_remove_many<T: Serialize>(&self, key: &str, members: &[T]) -> RedkitResult<u64> {
        require_key("key", key)?;
        if members.is_empty() {
            return Ok(0);
        }
        let payloads = self.serializer.serialize_all(members)?;
        self.write(redis::cmd("ZREM").arg(key).arg(payloads)).await
    }

    /// Add `by` to a member's score, creating it at `by`; returns the new score
    pub async fn sorted_set_increment<T>(&self, key: &str, member: &T, by: f64) -> RedkitResult<f64>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.write(redis::cmd("ZINCRBY").arg(key).arg(by).arg(payload)).await
    }

    pub async fn sorted_set_decrement<T>(&self, key: &str, member: &T, by: f64) -> RedkitResult<f64>
    where
        T: Serialize + ?Sized,
    {
        self.sorted_set_increment(key, member, -by).await
    }

    pub async fn sorted_set_score<T>(&self, key: &str, member: &T) -> RedkitResult<Option<f64>>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.read(redis::cmd("ZSCORE").arg(key).arg(payload)).await
    }

    /// Rank of a member in the given order, `None` when absent
    pub async fn sorted_set_rank<T>(&self, key: &str, member: &T, order: Order) -> RedkitResult<Option<u64>>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        let command = match order {
            Order::Ascending => "ZRANK",
            Order::Descending => "ZREVRANK",
        };
        self.read(redis::cmd(command).arg(key).arg(payload)).await
    }

    pub async fn sorted_set_length(&self, key: &str) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(redis::cmd("ZCARD").arg(key)).await
    }

    /// Number of members whose score falls in `range`
    pub async fn sorted_set_length_by_score(&self, key: &str, range: ScoreRange) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(
            redis::cmd("ZCOUNT")
                .arg(key)
                .arg(range.start_arg())
                .arg(range.stop_arg()),
        )
        .await
    }

    pub async fn sorted_set_range_by_rank<T>(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payloads: Vec<String> = self.read(&rank_command(key, start, stop, order, false)).await?;
        self.decode_all(payloads)
    }

    pub async fn sorted_set_range_by_rank_with_scores<T>(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> RedkitResult<Vec<SortedSetEntry<T>>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let pairs: Vec<(String, f64)> = self.read(&rank_command(key, start, stop, order, true)).await?;
        self.decode_entries(pairs)
    }

    /// Members whose score falls in `range`
    ///
    /// `skip` and `take` page through the matches; `take = -1` returns all of them.
    pub async fn sorted_set_range_by_score<T>(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        skip: i64,
        take: i64,
    ) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let cmd = score_command(key, range, order, skip, take, false);
        let payloads: Vec<String> = self.read(&cmd).await?;
        self.decode_all(payloads)
    }

    pub async fn sorted_set_range_by_score_with_scores<T>(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        skip: i64,
        take: i64,
    ) -> RedkitResult<Vec<SortedSetEntry<T>>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let cmd = score_command(key, range, order, skip, take, true);
        let pairs: Vec<(String, f64)> = self.read(&cmd).await?;
        self.decode_entries(pairs)
    }

    /// One page of members in rank order, pages numbered from 1
    pub async fn sorted_set_page<T>(
        &self,
        key: &str,
        page: i64,
        page_size: i64,
        order: Order,
    ) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        let range = PageRange::new(page, page_size)?;
        self.sorted_set_range_by_rank(key, range.start, range.stop, order)
            .await
    }

    /// Remove members between two ascending ranks, inclusive
    pub async fn sorted_set_remove_range_by_rank(&self, key: &str, start: i64, stop: i64) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.write(redis::cmd("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop))
            .await
    }

    pub async fn sorted_set_remove_range_by_score(&self, key: &str, range: ScoreRange) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.write(
            redis::cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg(range.start_arg())
                .arg(range.stop_arg()),
        )
        .await
    }

    /// Keep `size` members and drop the rest; returns how many were removed
    ///
    /// `Descending` keeps the highest scores, `Ascending` the lowest.
    pub async fn sorted_set_trim(&self, key: &str, size: i64, order: Order) -> RedkitResult<u64> {
        if size < 0 {
            return Err(RedkitError::argument("size", "size must not be negative"));
        }
        let (start, stop) = match order {
            // stays in range for every non-negative size; i64::MAX yields i64::MIN
            Order::Descending => (0, -size - 1),
            Order::Ascending => (size, -1),
        };
        self.sorted_set_remove_range_by_rank(key, start, stop).await
    }

    /// Remove and return the lowest (`Ascending`) or highest scored member
    pub async fn sorted_set_pop<T>(&self, key: &str, order: Order) -> RedkitResult<Option<SortedSetEntry<T>>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let command = match order {
            Order::Ascending => "ZPOPMIN",
            Order::Descending => "ZPOPMAX",
        };
        let pairs: Vec<(String, f64)> = self.write(redis::cmd(command).arg(key)).await?;
        Ok(self.decode_entries(pairs)?.into_iter().next())
    }

    /// Members of the combined sorted sets
    pub async fn sorted_set_combine<T, Q>(&self, operation: SetOperation, keys: &[Q]) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
        Q: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        require_keys("keys", keys)?;
        let mut cmd = redis::cmd(operation.sorted_set_command(false));
        cmd.arg(keys.len());
        for key in keys {
            cmd.arg(key.as_ref());
        }
        let payloads: Vec<String> = self.read(&cmd).await?;
        self.decode_all(payloads)
    }

    /// Combine sorted sets into `destination`; returns its resulting size
    ///
    /// `weights`, when given, needs one factor per key. Weights and
    /// aggregation do not apply to differences.
    pub async fn sorted_set_combine_and_store<Q: AsRef<str>>(
        &self,
        operation: SetOperation,
        destination: &str,
        keys: &[Q],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> RedkitResult<u64> {
        require_key("destination", destination)?;
        if keys.is_empty() {
            return Ok(0);
        }
        require_keys("keys", keys)?;

        let mut cmd = redis::cmd(operation.sorted_set_command(true));
        cmd.arg(destination).arg(keys.len());
        for key in keys {
            cmd.arg(key.as_ref());
        }

        if operation == SetOperation::Difference {
            if weights.is_some() {
                return Err(RedkitError::argument(
                    "weights",
                    "weights do not apply to a difference",
                ));
            }
        } else {
            if let Some(weights) = weights {
                if weights.len() != keys.len() {
                    return Err(RedkitError::argument(
                        "weights",
                        format!("expected {} weights, got {}", keys.len(), weights.len()),
                    ));
                }
                cmd.arg("WEIGHTS").arg(weights);
            }
            if aggregate != Aggregate::Sum {
                cmd.arg("AGGREGATE").arg(aggregate.as_str());
            }
        }

        self.write(&cmd).await
    }

    pub async fn sorted_set_remove_all(&self, key: &str) -> RedkitResult<bool> {
        self.key_delete(key).await
    }

    fn decode_entries<T>(&self, pairs: Vec<(String, f64)>) -> RedkitResult<Vec<SortedSetEntry<T>>>
    where
        T: DeserializeOwned + Default,
    {
        pairs
            .into_iter()
            .map(|(member, score)| Ok(SortedSetEntry::new(self.serializer.deserialize(&member)?, score)))
            .collect()
    }
}

fn rank_command(key: &str, start: i64, stop: i64, order: Order, with_scores: bool) -> redis::Cmd {
    let command = match order {
        Order::Ascending => "ZRANGE",
        Order::Descending => "ZREVRANGE",
    };
    let mut cmd = redis::cmd(command);
    cmd.arg(key).arg(start).arg(stop);
    if with_scores {
        cmd.arg("WITHSCORES");
    }
    cmd
}

fn score_command(
    key: &str,
    range: ScoreRange,
    order: Order,
    skip: i64,
    take: i64,
    with_scores: bool,
) -> redis::Cmd {
    // the reverse form takes its bounds high to low
    let mut cmd = match order {
        Order::Ascending => {
            let mut cmd = redis::cmd("ZRANGEBYSCORE");
            cmd.arg(key).arg(range.start_arg()).arg(range.stop_arg());
            cmd
        }
        Order::Descending => {
            let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
            cmd.arg(key).arg(range.stop_arg()).arg(range.start_arg());
            cmd
        }
    };
    if with_scores {
        cmd.arg("WITHSCORES");
    }
    if skip != 0 || take != -1 {
        cmd.arg("LIMIT").arg(skip).arg(take);
    }
    cmd
}
