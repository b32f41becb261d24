use clickhouse_proto_gen::errors::ProtoGenError;
use clickhouse_proto_gen::query::{
    build_parameterized_query, quote_identifier, Comparison, QueryBuilder, QueryOptions, QueryValue,
};
use pretty_assertions::assert_eq;

fn no_options() -> QueryOptions
{
    QueryOptions::default()
}

// =============================================================================
// Conditions
// =============================================================================

#[test]
fn test_empty_builder()
{
    let qb = QueryBuilder::new();
    assert!(qb.is_empty());
    assert_eq!(qb.where_clause(), "");
    assert!(qb.args().is_empty());
}

#[test]
fn test_comparisons_are_joined_with_and()
{
    let mut qb = QueryBuilder::new();
    qb.add_condition("slot", Comparison::Gte, 100u32);
    qb.add_condition("slot", Comparison::Lt, 200u32);
    qb.add_condition("block_root", Comparison::Ne, "0xabc");

    assert_eq!(qb.where_clause(), " WHERE `slot` >= ? AND `slot` < ? AND `block_root` != ?");
    assert_eq!(
        qb.args(),
        &[QueryValue::UInt(100), QueryValue::UInt(200), QueryValue::String("0xabc".to_string())]
    );
}

#[test]
fn test_datetime_placeholders()
{
    let mut qb = QueryBuilder::new();
    qb.add_condition("slot_start_date_time", Comparison::Gt, QueryValue::DateTime(1_700_000_000));
    qb.add_condition("event_time", Comparison::Lte, QueryValue::DateTime64(1_700_000_000_000_000));

    assert_eq!(
        qb.where_clause(),
        " WHERE `slot_start_date_time` > fromUnixTimestamp(?) AND `event_time` <= fromUnixTimestamp64Micro(?)"
    );
}

#[test]
fn test_between()
{
    let mut qb = QueryBuilder::new();
    qb.add_between("slot", 10u64, Some(QueryValue::UInt(20)));
    qb.add_between("epoch", 5u64, None);

    assert_eq!(qb.where_clause(), " WHERE `slot` BETWEEN ? AND ? AND `epoch` = ?");
    assert_eq!(qb.args().len(), 3);
}

#[test]
fn test_in_lists()
{
    let mut qb = QueryBuilder::new();
    qb.add_in("slot", vec![QueryValue::UInt(1), QueryValue::UInt(2)]);
    qb.add_not_in("client", vec![QueryValue::from("lighthouse")]);

    assert_eq!(qb.where_clause(), " WHERE `slot` IN (?, ?) AND `client` NOT IN (?)");
    assert_eq!(qb.args().len(), 3);
}

#[test]
fn test_empty_in_lists()
{
    let mut qb = QueryBuilder::new();
    qb.add_not_in("client", Vec::new());
    assert!(qb.is_empty());

    qb.add_in("slot", Vec::new());
    assert_eq!(qb.where_clause(), " WHERE 1 = 0");
    assert!(qb.args().is_empty());
}

#[test]
fn test_string_patterns_are_escaped()
{
    let mut qb = QueryBuilder::new();
    qb.add_contains("name", "50%_off");
    qb.add_starts_with("name", "pre");
    qb.add_ends_with("name", "fix");
    qb.add_not_like("name", "%raw%");

    assert_eq!(
        qb.where_clause(),
        " WHERE `name` LIKE ? AND `name` LIKE ? AND `name` LIKE ? AND `name` NOT LIKE ?"
    );
    assert_eq!(
        qb.args(),
        &[
            QueryValue::from("%50\\%\\_off%"),
            QueryValue::from("pre%"),
            QueryValue::from("%fix"),
            QueryValue::from("%raw%"),
        ]
    );
}

#[test]
fn test_null_checks()
{
    let mut qb = QueryBuilder::new();
    qb.add_is_null("gas_used");
    qb.add_is_not_null("parent_root");

    assert_eq!(qb.where_clause(), " WHERE `gas_used` IS NULL AND `parent_root` IS NOT NULL");
    assert!(qb.args().is_empty());
}

#[test]
fn test_map_conditions()
{
    let mut qb = QueryBuilder::new();
    qb.add_map_key_condition("labels", "env", Comparison::Eq, "prod");
    qb.add_map_contains("labels", "region");
    qb.add_map_not_contains("labels", "debug");
    qb.add_map_contains_any("labels", &["a".to_string(), "b".to_string()]);
    qb.add_map_contains_all("labels", &["c".to_string()]);

    assert_eq!(
        qb.where_clause(),
        " WHERE `labels`[?] = ? AND mapContains(`labels`, ?) AND NOT mapContains(`labels`, ?) \
         AND hasAny(mapKeys(`labels`), [?, ?]) AND hasAll(mapKeys(`labels`), [?])"
    );
    assert_eq!(qb.args()[0], QueryValue::from("env"));
    assert_eq!(qb.args()[1], QueryValue::from("prod"));
    assert_eq!(qb.args().len(), 7);
}

#[test]
fn test_array_conditions()
{
    let mut qb = QueryBuilder::new();
    qb.add_array_has("blob_sizes", 128u32);
    qb.add_array_has_any("blob_sizes", vec![QueryValue::UInt(1), QueryValue::UInt(2)]);
    qb.add_array_has_all("blob_sizes", vec![QueryValue::UInt(3)]);
    qb.add_array_length("blob_sizes", Comparison::Gt, 2);
    qb.add_array_is_not_empty("blob_sizes");
    qb.add_array_is_empty("validators");

    assert_eq!(
        qb.where_clause(),
        " WHERE has(`blob_sizes`, ?) AND hasAny(`blob_sizes`, [?, ?]) AND hasAll(`blob_sizes`, [?]) \
         AND length(`blob_sizes`) > ? AND notEmpty(`blob_sizes`) AND empty(`validators`)"
    );
    assert_eq!(qb.args().last(), Some(&QueryValue::UInt(2)));
}

#[test]
fn test_quote_identifier()
{
    assert_eq!(quote_identifier("slot"), "`slot`");
    assert_eq!(quote_identifier("we`ird"), "`we\\`ird`");
}

// =============================================================================
// Full queries
// =============================================================================

#[test]
fn test_build_query()
{
    let mut qb = QueryBuilder::new();
    qb.add_condition("slot", Comparison::Eq, 42u32);

    let columns = ["slot", "toUnixTimestamp(`slot_start_date_time`) AS `slot_start_date_time`"];
    let options = QueryOptions::default().with_database("mainnet").with_final();

    let query = build_parameterized_query("fct_block", &columns, &qb, "slot DESC", 100, 200, &options).unwrap();

    assert_eq!(
        query.query,
        "SELECT `slot`, toUnixTimestamp(`slot_start_date_time`) AS `slot_start_date_time` \
         FROM `mainnet`.fct_block FINAL WHERE `slot` = ? ORDER BY slot DESC LIMIT 100 OFFSET 200"
    );
    assert_eq!(query.args, vec![QueryValue::UInt(42)]);
}

#[test]
fn test_build_query_without_extras()
{
    let qb = QueryBuilder::new();
    let columns = vec!["slot".to_string()];

    let query = build_parameterized_query("fct_block", &columns, &qb, "", 0, 50, &no_options()).unwrap();
    // offset needs a limit
    assert_eq!(query.query, "SELECT `slot` FROM fct_block");
    assert!(query.args.is_empty());

    let query = build_parameterized_query("fct_block", &columns, &qb, "  ", 10, 0, &no_options()).unwrap();
    assert_eq!(query.query, "SELECT `slot` FROM fct_block LIMIT 10");
}

#[test]
fn test_build_query_requires_columns()
{
    let columns: Vec<String> = Vec::new();

    match build_parameterized_query("t", &columns, &QueryBuilder::new(), "", 10, 0, &no_options()) {
        Err(ProtoGenError::EmptyColumnList) => (),
        other => panic!("Expected EmptyColumnList error, got {:?}", other),
    }
}
