// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Placement constraints matched against offer attributes.

use std::collections::{HashMap, HashSet};

use gravel_core::error::{GravelError, Result};
use gravel_core::offer::AttributeValue;
use log::debug;

/// Required attribute values per attribute name. An empty value set means
/// the attribute only needs to be present.
pub type Constraints = HashMap<String, HashSet<String>>;

/// Parses a constraint string of the form
/// `"attr1:v1,v2;attr2"` into [`Constraints`].
///
/// A pair without values (`"attr"` or `"attr:"`) requires mere presence of
/// the attribute. An empty input yields no constraints.
pub fn parse_constraints(raw: &str) -> Result<Constraints> {
    let mut constraints = Constraints::new();
    for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
        let (name, values) = match pair.split_once(':') {
            Some((name, values)) => (name.trim(), values.trim()),
            None => (pair.trim(), ""),
        };
        if name.is_empty() {
            return Err(GravelError::Configuration(format!(
                "Invalid constraint '{pair}' in '{raw}': missing attribute name"
            )));
        }
        let values = values
            .split(',')
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect::<HashSet<_>>();
        constraints.insert(name.to_string(), values);
    }
    Ok(constraints)
}

/// Whether an offer's attributes satisfy every configured constraint.
///
/// Scalar attributes compare numerically, text attributes must be one of the
/// required values, set attributes must offer at least the required values,
/// and range attributes match when any required value lies in some offered
/// range.
pub fn matches_constraints(
    constraints: &Constraints,
    attributes: &HashMap<String, AttributeValue>,
) -> bool {
    constraints.iter().all(|(name, required)| {
        let Some(offered) = attributes.get(name) else {
            debug!("Offer is missing required attribute {name}");
            return false;
        };
        if required.is_empty() {
            // presence is all that was asked for
            return true;
        }
        let matched = match offered {
            AttributeValue::Scalar(value) => required
                .iter()
                .filter_map(|r| r.parse::<f64>().ok())
                .any(|r| r == *value),
            AttributeValue::Text(value) => required.contains(value),
            AttributeValue::Set(values) => required.is_subset(values),
            AttributeValue::Ranges(ranges) => required
                .iter()
                .filter_map(|r| r.parse::<u64>().ok())
                .any(|r| ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&r))),
        };
        if !matched {
            debug!("Offer attribute {name} does not satisfy {required:?}");
        }
        matched
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(entries: Vec<(&str, AttributeValue)>) -> HashMap<String, AttributeValue> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parse_empty_and_blank() -> Result<()> {
        assert!(parse_constraints("")?.is_empty());
        assert!(parse_constraints(" ; ;")?.is_empty());
        Ok(())
    }

    #[test]
    fn parse_presence_and_values() -> Result<()> {
        let constraints = parse_constraints("os:centos7;zone:east,west;rack")?;
        assert_eq!(set(&["centos7"]), constraints["os"]);
        assert_eq!(set(&["east", "west"]), constraints["zone"]);
        assert!(constraints["rack"].is_empty());
        assert_eq!(parse_constraints("rack:")?["rack"], HashSet::new());
        Ok(())
    }

    #[test]
    fn parse_rejects_missing_attribute_name() {
        assert!(parse_constraints(":value").is_err());
        assert!(parse_constraints("os:centos7;:x").is_err());
    }

    #[test]
    fn missing_attribute_fails() {
        let constraints = parse_constraints("zone:east").unwrap();
        assert!(!matches_constraints(&constraints, &attrs(vec![])));
    }

    #[test]
    fn presence_only_matches_any_value() {
        let constraints = parse_constraints("zone").unwrap();
        let offered = attrs(vec![("zone", AttributeValue::Text("mars".to_string()))]);
        assert!(matches_constraints(&constraints, &offered));
    }

    #[test]
    fn text_attribute_matches_by_membership() {
        let constraints = parse_constraints("zone:east,west").unwrap();
        let east = attrs(vec![("zone", AttributeValue::Text("east".to_string()))]);
        let north = attrs(vec![("zone", AttributeValue::Text("north".to_string()))]);
        assert!(matches_constraints(&constraints, &east));
        assert!(!matches_constraints(&constraints, &north));
    }

    #[test]
    fn scalar_attribute_compares_numerically() {
        let constraints = parse_constraints("gpus:2").unwrap();
        let two = attrs(vec![("gpus", AttributeValue::Scalar(2.0))]);
        let one = attrs(vec![("gpus", AttributeValue::Scalar(1.0))]);
        assert!(matches_constraints(&constraints, &two));
        assert!(!matches_constraints(&constraints, &one));
    }

    #[test]
    fn set_attribute_requires_superset() {
        let constraints = parse_constraints("features:ssd,avx").unwrap();
        let all = attrs(vec![("features", AttributeValue::Set(set(&["ssd", "avx", "nvme"])))]);
        let partial = attrs(vec![("features", AttributeValue::Set(set(&["ssd"])))]);
        assert!(matches_constraints(&constraints, &all));
        assert!(!matches_constraints(&constraints, &partial));
    }

    #[test]
    fn range_attribute_matches_contained_points() {
        let constraints = parse_constraints("ports:31005").unwrap();
        let inside = attrs(vec![("ports", AttributeValue::Ranges(vec![(31000, 32000)]))]);
        let outside = attrs(vec![("ports", AttributeValue::Ranges(vec![(40000, 41000)]))]);
        assert!(matches_constraints(&constraints, &inside));
        assert!(!matches_constraints(&constraints, &outside));
    }

    #[test]
    fn all_constraints_must_hold() {
        let constraints = parse_constraints("zone:east;os:centos7").unwrap();
        let offered = attrs(vec![
            ("zone", AttributeValue::Text("east".to_string())),
            ("os", AttributeValue::Text("debian".to_string())),
        ]);
        assert!(!matches_constraints(&constraints, &offered));
    }
}
