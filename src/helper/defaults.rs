//! Built-in helper registrations.

use super::builder::HelperRegistry;
use super::types::{ParamKind, Signature};
use super::{filter, query, transform};
use crate::query::QueryClient;
use std::sync::Arc;

/// Register the helpers that need nothing but the event.
///
/// | Helper | Arguments | Effect |
/// |--------|-----------|--------|
/// | `exists` | none | success iff destination present |
/// | `not_exists` | none | success iff destination absent |
/// | `s_eq` | literal or `$ref` | success iff destination string equals it |
/// | `s_up` / `s_lo` | literal or `$ref` | write the case-mapped string |
/// | `ef_append` | `$ref` | merge referenced value into destination |
/// | `ef_delete` | none | remove destination |
/// | `r_ext` | target, pattern | store first capture group at target |
pub fn register_defaults(registry: &mut HelperRegistry) {
    registry
        .register("exists", Signature::nullary(), filter::exists)
        .register("not_exists", Signature::nullary(), filter::not_exists)
        .register("s_eq", Signature::new(&[ParamKind::Any]), filter::string_equal)
        .register("s_up", Signature::new(&[ParamKind::Any]), transform::upper_case)
        .register("s_lo", Signature::new(&[ParamKind::Any]), transform::lower_case)
        .register(
            "ef_append",
            Signature::new(&[ParamKind::Reference]),
            transform::append,
        )
        .register("ef_delete", Signature::nullary(), transform::delete)
        .register(
            "r_ext",
            Signature::new(&[ParamKind::Literal, ParamKind::Literal]),
            transform::regex_extract,
        );
}

/// Register `wdb_update` and `wdb_query`, both bound to `client`.
pub fn register_query_helpers(registry: &mut HelperRegistry, client: Arc<dyn QueryClient>) {
    let update_client = Arc::clone(&client);
    registry
        .register("wdb_update", Signature::new(&[ParamKind::Any]), move |definition| {
            query::update(definition, Arc::clone(&update_client))
        })
        .register("wdb_query", Signature::new(&[ParamKind::Any]), move |definition| {
            query::query(definition, Arc::clone(&client))
        });
}
