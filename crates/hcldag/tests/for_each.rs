mod common;

use common::{addresses, load, plan, resource, DummyData, DummyResource};
use hcldag::value;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn one_instance_per_element() {
    let config = plan(
        r#"
        resource "dummy" "foo" {
          for_each = toset(["a", "b", "a"])
          tags     = { name = each.key, value = each.value }
        }

        resource "dummy" "bar" {
          tags = { a = resource.dummy.foo["a"].tags.name }
        }
        "#,
    );

    assert_eq!(
        addresses(&config),
        ["resource.dummy.bar", "resource.dummy.foo[a]", "resource.dummy.foo[b]"]
    );
    assert_eq!(
        value::to_json(&resource(&config, "resource.dummy.foo[b]").tags),
        json!({ "name": "b", "value": "b" })
    );
    assert_eq!(
        value::to_json(&resource(&config, "resource.dummy.bar").tags),
        json!({ "a": "a" })
    );

    let mut parents: Vec<_> = config.ancestors("resource.dummy.bar").unwrap().into_iter().collect();
    parents.sort();
    assert_eq!(parents, ["resource.dummy.foo[a]", "resource.dummy.foo[b]"]);
}

#[test]
fn map_keys() {
    let config = plan(
        r#"
        locals {
          regions = { eu = "west", us = "east" }
        }

        data "dummy" "region" {
          for_each = local.regions
          data     = "${each.key}-${each.value}"
        }
        "#,
    );

    let mut data: Vec<_> = config
        .blocks::<DummyData>()
        .into_iter()
        .map(|block| value::to_json(&block.data))
        .collect();
    data.sort_by_key(|value| value.to_string());
    assert_eq!(data, [json!("eu-west"), json!("us-east")]);

    let ctx = config.eval_context();
    let data = ctx.variable("data").unwrap();
    insta::assert_json_snapshot!(value::to_json(data), @r###"
    {
      "dummy": {
        "region": {
          "eu": {
            "data": "eu-west",
            "region": "eu"
          },
          "us": {
            "data": "us-east",
            "region": "eu"
          }
        }
      }
    }
    "###);
}

#[test]
fn expanded_before_plan_when_possible() {
    let config = load(
        r#"
        resource "dummy" "r" {
          for_each = toset(local.names)
        }

        locals {
          names = ["x", "y"]
        }
        "#,
    )
    .unwrap();

    assert_eq!(addresses(&config), ["local.names", "resource.dummy.r[x]", "resource.dummy.r[y]"]);
}

#[test]
fn expanded_during_plan() {
    let mut config = load(
        r#"
        data "dummy" "names" {
          data = ["x", "y"]
        }

        resource "dummy" "r" {
          for_each = toset(data.dummy.names.data)
          tags     = { name = each.value }
        }
        "#,
    )
    .unwrap();
    assert_eq!(addresses(&config), ["data.dummy.names", "resource.dummy.r"]);

    config.run_plan().unwrap();
    assert_eq!(
        addresses(&config),
        ["data.dummy.names", "resource.dummy.r[x]", "resource.dummy.r[y]"]
    );
    assert!(config.blocks::<DummyResource>().iter().all(|r| r.planned));
}

#[test]
fn empty_collections_remove_the_block() {
    let mut config = load(
        r#"
        locals {
          foo = []
        }

        resource "dummy" "foobar" {
          for_each = local.foo
        }

        resource "dummy" "bar" {
          for_each   = local.foo
          depends_on = [resource.dummy.foobar]
        }

        resource "dummy" "foo" {
          for_each   = local.foo
          depends_on = [resource.dummy.bar]
        }

        resource "dummy" "after" {
          tags       = { count = length(local.foo) }
          depends_on = [resource.dummy.foo]
        }
        "#,
    )
    .unwrap();
    config.run_plan().unwrap();

    assert_eq!(addresses(&config), ["local.foo", "resource.dummy.after"]);
    let after = resource(&config, "resource.dummy.after");
    assert!(after.planned);
    assert_eq!(value::to_json(&after.tags), json!({ "count": 0 }));
}

#[test]
fn each_in_dynamic_blocks() {
    let config = plan(
        r#"
        resource "dummy" "r" {
          for_each = toset(["a"])

          dynamic "nested_block" {
            for_each = ["1", "2"]
            content {
              id = "${each.key}-${nested_block.value}"
            }
          }
        }
        "#,
    );

    let ids: Vec<_> = resource(&config, "resource.dummy.r[a]")
        .nested_block
        .iter()
        .map(|nested| nested.id.clone())
        .collect();
    assert_eq!(ids, ["a-1", "a-2"]);
}

#[test]
fn not_iterable() {
    let errors = load(
        r#"
        resource "dummy" "r" {
          for_each = 1
        }
        "#,
    )
    .unwrap_err();

    let message = errors.to_string();
    assert!(message.starts_with("resource.dummy.r: "), "{message}");
    assert!(message.contains("invalid `for_each`, expect set or map, got number"), "{message}");
}
