use mv_view_types::{Callback, ViewConfig};
use serde_json::json;

pub mod registry;

/// Adds `record[prop]` to `context.total` for every bound property.
pub(crate) fn sum_each() -> Callback {
    crate::each_fn!(|step| {
        let mut total = step.context["total"].as_i64().unwrap_or(0);
        for prop in step.properties() {
            total += step.record[prop].as_i64().unwrap_or(0);
        }
        step.context["total"] = serde_json::json!(total);
        Ok(())
    })
}

pub(crate) fn sum_pre() -> Callback {
    crate::pre_fn!(|_args| Ok(serde_json::json!({ "total": 0 })))
}

/// Commutative over partials: the sum of every partial total.
pub(crate) fn sum_post() -> Callback {
    crate::post_fn!(|_args, input| {
        let total: i64 = input
            .into_contexts()
            .iter()
            .map(|ctx| ctx["total"].as_i64().unwrap_or(0))
            .sum();
        Ok(serde_json::json!(total))
    })
}

pub(crate) fn sum_config(name: &str) -> ViewConfig {
    ViewConfig::collection(name)
        .pre(sum_pre())
        .each(sum_each())
        .post(sum_post())
}

pub(crate) fn priced(prices: &[i64]) -> Vec<serde_json::Value> {
    prices.iter().map(|price| json!({ "price": price })).collect()
}
