//! Property-Based Tests for Serialization and Range Arithmetic
//!
//! These tests verify invariants that should hold regardless of input:
//! payload round trips, the null/empty rules, page math and score bounds.

use async_trait::async_trait;
use proptest::prelude::*;
use redis::Value;
use redkit::redkit_client::ConnectionSettings;
use redkit::{
    ConnectionProvider, Connector, Exclude, JsonSerializer, PageRange, RedisOptions, RedisService,
    RedkitResult, ScoreRange, Serializer, When,
};
use redkit_testing::MockConnection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Basket {
    owner: String,
    items: Vec<String>,
    total_cents: u64,
    coupon: Option<String>,
}

#[derive(Clone)]
struct MockConnector(MockConnection);

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, _settings: &ConnectionSettings) -> RedkitResult<MockConnection> {
        Ok(self.0.clone())
    }
}

// Strategy for generating stored values
fn basket_strategy() -> impl Strategy<Value = Basket> {
    (
        ".{0,32}",
        prop::collection::vec("[a-z0-9 ]{0,16}", 0..8),
        any::<u64>(),
        prop::option::of("[A-Z0-9]{4,8}"),
    )
        .prop_map(|(owner, items, total_cents, coupon)| Basket {
            owner,
            items,
            total_cents,
            coupon,
        })
}

// Strategy for generating valid keys
fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9:_-]{1,48}").unwrap()
}

proptest! {
    /// Property: deserialize(serialize(v)) == v
    #[test]
    fn prop_json_round_trip(basket in basket_strategy()) {
        let payload = JsonSerializer.serialize(&basket).unwrap();
        let back: Basket = JsonSerializer.deserialize(&payload).unwrap();
        prop_assert_eq!(back, basket);
    }

    /// Property: what the façade writes is what it reads back
    #[test]
    fn prop_facade_round_trip(key in key_strategy(), basket in basket_strategy()) {
        tokio_test::block_on(async {
            let mock = MockConnection::new().with_reply(Value::Okay);
            let options = RedisOptions::new("cache:6379").with_keep_alive_secs(0);
            let service = RedisService::new(ConnectionProvider::with_connector(
                options,
                MockConnector(mock.clone()),
            ));

            service.string_set(&key, &basket, None, When::Always).await.unwrap();
            let written = mock.last_command().unwrap();
            prop_assert_eq!(&written.args[1], &key);

            mock.push_reply(Value::BulkString(written.args[2].clone().into_bytes()));
            let read: Basket = service.string_get(&key).await.unwrap();
            prop_assert_eq!(read, basket);
            Ok(())
        })?;
    }

    /// Property: pages are contiguous, non-overlapping and exactly page_size long
    #[test]
    fn prop_page_ranges_tile(page in 1i64..10_000, page_size in 1i64..1_000) {
        let range = PageRange::new(page, page_size).unwrap();
        let next = PageRange::new(page + 1, page_size).unwrap();

        prop_assert_eq!(range.stop - range.start + 1, page_size);
        prop_assert_eq!(range.start, (page - 1) * page_size);
        prop_assert_eq!(next.start, range.stop + 1);
    }

    /// Property: pages and sizes below one never produce a range
    #[test]
    fn prop_invalid_pages_rejected(page in -100i64..1, page_size in -100i64..100) {
        prop_assert!(PageRange::new(page, page_size).is_err());
        prop_assert!(PageRange::new(1, page.min(0)).is_err());
    }

    /// Property: exclusive bounds carry the `(` prefix, inclusive ones do not
    #[test]
    fn prop_score_bounds(min in -1e6f64..1e6, max in -1e6f64..1e6) {
        let inclusive = ScoreRange::new(min, max);
        prop_assert!(!inclusive.start_arg().starts_with('('));
        prop_assert!(!inclusive.stop_arg().starts_with('('));

        let exclusive = ScoreRange::new(min, max).exclude(Exclude::Both);
        prop_assert_eq!(exclusive.start_arg(), format!("({}", min));
        prop_assert_eq!(exclusive.stop_arg(), format!("({}", max));
    }
}

#[test]
fn test_null_and_empty_rules() {
    assert_eq!(JsonSerializer.serialize(&Option::<Basket>::None).unwrap(), "");
    assert_eq!(JsonSerializer.serialize(&()).unwrap(), "");
    let empty: Basket = JsonSerializer.deserialize("").unwrap();
    assert_eq!(empty, Basket::default());
}
