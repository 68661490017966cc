// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::pools;
use crate::quantile::quantile_threshold;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;
use verif_core::{
    Bounds, Feature, Pool, Threshold, ThresholdGroup, ThresholdOperator, ThresholdOrientation,
    ThresholdType, ThresholdsByFeature, VerifError,
};

/// Restricts declarations to `features` and the eligible `types`. With `include_all_data`
/// every feature in `features` receives the all-data threshold, declared or not; otherwise
/// only declared features are kept.
pub fn select(
    thresholds: &ThresholdsByFeature,
    features: &BTreeSet<Feature>,
    types: &[ThresholdType],
    include_all_data: bool,
) -> ThresholdsByFeature {
    let mut selected = ThresholdsByFeature::new();
    for feature in features {
        let declared = thresholds.get(feature);
        if declared.is_none() && !include_all_data {
            continue;
        }
        let mut eligible: BTreeSet<Threshold> = declared
            .into_iter()
            .flatten()
            .filter(|threshold| {
                types.contains(&threshold.threshold_type()) && !threshold.is_all_data()
            })
            .cloned()
            .collect();
        if include_all_data {
            eligible.insert(Threshold::all_data());
        }
        selected.insert(feature.clone(), eligible);
    }
    selected
}

/// True when any feature declares a threshold of `threshold_type`.
pub fn has_type(thresholds: &ThresholdsByFeature, threshold_type: ThresholdType) -> bool {
    thresholds
        .values()
        .flatten()
        .any(|threshold| threshold.threshold_type() == threshold_type)
}

/// Resolves probability thresholds into quantile thresholds using the climatology of each
/// feature's mini pool. Non-probability thresholds pass through unchanged.
pub fn add_quantiles<T>(
    thresholds: &ThresholdsByFeature,
    pool: &Pool<T>,
) -> Result<ThresholdsByFeature, VerifError> {
    let needs_climatology = thresholds
        .values()
        .flatten()
        .any(|threshold| threshold.threshold_type() == ThresholdType::Probability);
    if !needs_climatology {
        return Ok(thresholds.clone());
    }

    let minis = pools::decompose(pool, pools::feature_key)?;
    if minis.values().all(|mini| mini.climatology().is_none()) {
        return Err(VerifError::threshold(format!(
            "probability thresholds were declared for feature group '{}' but no climatology \
             is available to resolve them",
            pool.metadata().feature_group()
        )));
    }

    let mut resolved = BTreeMap::new();
    for (feature, declared) in thresholds {
        let has_probabilities = declared
            .iter()
            .any(|threshold| threshold.threshold_type() == ThresholdType::Probability);
        if !has_probabilities {
            resolved.insert(feature.clone(), declared.clone());
            continue;
        }

        let Some(mini) = minis.get(feature) else {
            debug!(
                target: "verif.thresholds",
                feature = %feature,
                "feature has no pairs in this pool; dropping its probability thresholds"
            );
            let kept = declared
                .iter()
                .filter(|threshold| threshold.threshold_type() != ThresholdType::Probability)
                .cloned()
                .collect();
            resolved.insert(feature.clone(), kept);
            continue;
        };

        let climatology = mini.climatology().ok_or_else(|| {
            VerifError::threshold(format!(
                "feature '{feature}' declares probability thresholds but has no climatology"
            ))
        })?;
        let sorted = climatology.sorted();
        let quantiles = declared
            .iter()
            .map(|threshold| match threshold.threshold_type() {
                ThresholdType::Probability => quantile_threshold(threshold, &sorted),
                ThresholdType::Value | ThresholdType::ProbabilityClassifier => {
                    Ok(threshold.clone())
                }
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        resolved.insert(feature.clone(), quantiles);
    }

    Ok(resolved)
}

/// Collapses thresholds that differ only in their probabilities, keeping the one with the
/// largest probability. Several probabilities can resolve to the same quantile when the
/// climatology has repeated values.
pub fn deduplicate(thresholds: &BTreeSet<Threshold>) -> BTreeSet<Threshold> {
    let mut by_values: BTreeMap<Threshold, &Threshold> = BTreeMap::new();
    let mut kept = BTreeSet::new();
    for threshold in thresholds {
        match threshold.without_probabilities() {
            Some(key) if threshold.has_probabilities() => {
                by_values
                    .entry(key)
                    .and_modify(|current| {
                        if threshold > *current {
                            *current = threshold;
                        }
                    })
                    .or_insert(threshold);
            }
            _ => {
                kept.insert(threshold.clone());
            }
        }
    }
    kept.extend(by_values.into_values().cloned());
    kept
}

/// [`deduplicate`] applied to every feature.
pub fn deduplicate_all(thresholds: &ThresholdsByFeature) -> ThresholdsByFeature {
    thresholds
        .iter()
        .map(|(feature, declared)| (feature.clone(), deduplicate(declared)))
        .collect()
}

/// Identity shared by the per-feature members of one logical threshold.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum LogicalKey {
    Exact(Threshold),
    Probability {
        probabilities: Bounds,
        operator: ThresholdOperator,
        orientation: ThresholdOrientation,
        threshold_type: ThresholdType,
    },
    Named {
        label: Arc<str>,
        operator: ThresholdOperator,
        threshold_type: ThresholdType,
    },
}

fn logical_key(threshold: &Threshold) -> LogicalKey {
    if let Some(label) = threshold.label() {
        return LogicalKey::Named {
            label: Arc::from(label),
            operator: threshold.operator(),
            threshold_type: threshold.threshold_type(),
        };
    }
    if let Some(probabilities) = threshold.probabilities() {
        return LogicalKey::Probability {
            probabilities,
            operator: threshold.operator(),
            orientation: threshold.orientation(),
            threshold_type: threshold.threshold_type(),
        };
    }
    LogicalKey::Exact(threshold.clone())
}

/// True when `a` and `b` are per-feature members of the same logical threshold.
pub fn same_logical_threshold(a: &Threshold, b: &Threshold) -> bool {
    logical_key(a) == logical_key(b)
}

/// Groups per-feature thresholds into logical thresholds: named thresholds by name, unnamed
/// probability thresholds by probability, everything else by exact equality. Each group maps
/// a feature to its member; features with no member are absent from that group.
pub fn decompose(thresholds: &ThresholdsByFeature) -> Vec<ThresholdGroup> {
    let mut groups: BTreeMap<LogicalKey, ThresholdGroup> = BTreeMap::new();
    for (feature, declared) in thresholds {
        for threshold in declared {
            groups
                .entry(logical_key(threshold))
                .or_default()
                .entry(feature.clone())
                .or_insert_with(|| threshold.clone());
        }
    }
    groups.into_values().filter(|group| !group.is_empty()).collect()
}

fn placeholder(operator: ThresholdOperator) -> Bounds {
    match operator {
        ThresholdOperator::Between => Bounds::Two(f64::NAN, f64::NAN),
        ThresholdOperator::Greater
        | ThresholdOperator::Less
        | ThresholdOperator::GreaterEqual
        | ThresholdOperator::LessEqual
        | ThresholdOperator::Equal => Bounds::One(f64::NAN),
    }
}

/// The single distinct value, or the number of distinct values.
fn unique<V: Ord>(values: impl Iterator<Item = V>) -> Result<V, usize> {
    let mut distinct: BTreeSet<V> = values.collect();
    if distinct.len() == 1 {
        if let Some(value) = distinct.pop_first() {
            return Ok(value);
        }
    }
    Err(distinct.len())
}

/// Collapses the members of one logical threshold into a representative threshold for pool
/// metadata. Operator, orientation and type must agree. Absent attributes are ignored; any
/// attribute whose present values agree is kept. When neither values nor probabilities agree,
/// a NaN placeholder stands in, for probabilities first.
pub fn compose<'a>(
    thresholds: impl IntoIterator<Item = &'a Threshold>,
) -> Result<Threshold, VerifError> {
    let members: Vec<&Threshold> = thresholds.into_iter().collect();
    match members.as_slice() {
        [] => {
            return Err(VerifError::threshold(
                "cannot compose an empty set of thresholds",
            ));
        }
        [only] => return Ok((*only).clone()),
        _ => {}
    }

    let operator = unique(members.iter().map(|t| t.operator())).map_err(|n| {
        VerifError::threshold(format!(
            "cannot compose thresholds with {n} different operators"
        ))
    })?;
    let orientation = unique(members.iter().map(|t| t.orientation())).map_err(|n| {
        VerifError::threshold(format!(
            "cannot compose thresholds with {n} different orientations"
        ))
    })?;
    let threshold_type = unique(members.iter().map(|t| t.threshold_type())).map_err(|n| {
        VerifError::threshold(format!("cannot compose thresholds with {n} different types"))
    })?;

    let mut builder = Threshold::builder(operator)
        .orientation(orientation)
        .threshold_type(threshold_type);
    let values = unique(members.iter().filter_map(|t| t.values()));
    let probabilities = unique(members.iter().filter_map(|t| t.probabilities()));
    let (mut values, mut probabilities) = match (values, probabilities) {
        (Err(v), Err(p)) if p > 1 => (Err(v), Ok(placeholder(operator))),
        (Err(v), Err(_)) if v > 1 => (Ok(placeholder(operator)), Err(0)),
        pair => pair,
    };
    // The composed type still needs the side it is defined by.
    match threshold_type {
        ThresholdType::Value if values.is_err() => values = Ok(placeholder(operator)),
        ThresholdType::Probability | ThresholdType::ProbabilityClassifier
            if probabilities.is_err() =>
        {
            probabilities = Ok(placeholder(operator));
        }
        _ => {}
    }
    if let Ok(bounds) = values {
        builder = builder.values(bounds);
    }
    if let Ok(bounds) = probabilities {
        builder = builder.probabilities(bounds);
    }
    if let Ok(label) = unique(members.iter().filter_map(|t| t.label())) {
        builder = builder.label(label);
    }
    if let Ok(units) = unique(members.iter().filter_map(|t| t.units())) {
        builder = builder.units(units);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::{add_quantiles, compose, decompose, deduplicate, select};
    use std::collections::{BTreeMap, BTreeSet};
    use verif_core::{
        Bounds, Climatology, Feature, FeatureGroup, Pool, PoolMetadata, Threshold,
        ThresholdOperator, ThresholdOrientation, ThresholdType, ThresholdsByFeature,
    };

    fn value(v: f64) -> Threshold {
        Threshold::value(
            ThresholdOperator::Greater,
            Bounds::One(v),
            ThresholdOrientation::Left,
        )
        .expect("value threshold should build")
    }

    fn probability(p: f64) -> Threshold {
        Threshold::probability(
            ThresholdOperator::Greater,
            Bounds::One(p),
            ThresholdOrientation::Left,
        )
        .expect("probability threshold should build")
    }

    fn feature_pool(name: &str, data: Vec<f64>, climatology: Option<Vec<f64>>) -> Pool<f64> {
        let mut builder = Pool::builder()
            .metadata(PoolMetadata::new(FeatureGroup::single(Feature::new(name))))
            .add_data(data);
        if let Some(values) = climatology {
            builder = builder.climatology(&Climatology::new(values));
        }
        builder.build().expect("feature pool should build")
    }

    fn group_pool(minis: &[Pool<f64>]) -> Pool<f64> {
        let features = minis
            .iter()
            .flat_map(|mini| mini.metadata().feature_group().features().clone());
        let mut builder = Pool::builder().metadata(PoolMetadata::new(FeatureGroup::new(
            Some("group"),
            features,
        )));
        for mini in minis {
            builder = builder.add_pool(mini);
        }
        builder.build().expect("group pool should build")
    }

    #[test]
    fn select_filters_features_and_types_and_adds_all_data() {
        let mut declared = ThresholdsByFeature::new();
        declared.insert(
            Feature::new("A"),
            BTreeSet::from([
                value(1.0),
                probability(0.5),
                Threshold::classifier(ThresholdOperator::Greater, Bounds::One(0.5))
                    .expect("classifier should build"),
            ]),
        );
        declared.insert(Feature::new("Z"), BTreeSet::from([value(2.0)]));

        let features = BTreeSet::from([Feature::new("A")]);
        let selected = select(&declared, &features, &[ThresholdType::Value], true);
        assert_eq!(selected.len(), 1);
        let a = &selected[&Feature::new("A")];
        assert_eq!(a.len(), 2);
        assert!(a.contains(&Threshold::all_data()));
        assert!(a.contains(&value(1.0)));

        let without = select(&declared, &features, &[ThresholdType::ProbabilityClassifier], false);
        assert_eq!(without[&Feature::new("A")].len(), 1);

        let undeclared = BTreeSet::from([Feature::new("Q")]);
        assert_eq!(
            select(&declared, &undeclared, &[ThresholdType::Value], true)[&Feature::new("Q")],
            BTreeSet::from([Threshold::all_data()])
        );
        assert!(select(&declared, &undeclared, &[ThresholdType::Value], false).is_empty());
    }

    #[test]
    fn add_quantiles_resolves_per_feature_climatology() {
        let pool = group_pool(&[
            feature_pool("A", vec![1.0], Some(vec![1.0, 2.0, 3.0, 4.0])),
            feature_pool("B", vec![2.0], Some(vec![10.0, 20.0, 30.0, 40.0])),
        ]);
        let mut declared = ThresholdsByFeature::new();
        declared.insert(Feature::new("A"), BTreeSet::from([probability(0.5), value(9.0)]));
        declared.insert(Feature::new("B"), BTreeSet::from([probability(0.5)]));

        let resolved = add_quantiles(&declared, &pool).expect("climatology is available");
        let a_values: Vec<f64> = resolved[&Feature::new("A")]
            .iter()
            .filter_map(|t| t.values().map(Bounds::first))
            .collect();
        assert!(a_values.contains(&2.5));
        assert!(a_values.contains(&9.0));
        let b = resolved[&Feature::new("B")]
            .iter()
            .next()
            .expect("B keeps one threshold");
        assert_eq!(b.values(), Some(Bounds::One(25.0)));
        assert!(b.is_quantile());
    }

    #[test]
    fn add_quantiles_requires_climatology() {
        let pool = group_pool(&[feature_pool("A", vec![1.0], None)]);
        let mut declared = ThresholdsByFeature::new();
        declared.insert(Feature::new("A"), BTreeSet::from([probability(0.5)]));
        let err = add_quantiles(&declared, &pool).expect_err("no climatology anywhere");
        assert!(err.is_configuration());

        let partial = group_pool(&[
            feature_pool("A", vec![1.0], None),
            feature_pool("B", vec![1.0], Some(vec![1.0])),
        ]);
        assert!(add_quantiles(&declared, &partial).is_err());

        let mut values_only = ThresholdsByFeature::new();
        values_only.insert(Feature::new("A"), BTreeSet::from([value(1.0)]));
        assert_eq!(
            add_quantiles(&values_only, &pool).expect("nothing to resolve"),
            values_only
        );
    }

    #[test]
    fn deduplicate_keeps_largest_probability_for_shared_quantile() {
        let low = probability(0.5)
            .with_values(Bounds::One(3.0))
            .expect("values attach");
        let high = probability(0.6)
            .with_values(Bounds::One(3.0))
            .expect("values attach");
        let other = probability(0.9)
            .with_values(Bounds::One(8.0))
            .expect("values attach");
        let deduped = deduplicate(&BTreeSet::from([low, high.clone(), other.clone(), value(3.0)]));
        assert_eq!(deduped.len(), 3);
        assert!(deduped.contains(&high));
        assert!(deduped.contains(&other));
        assert!(deduped.contains(&value(3.0)));
    }

    #[test]
    fn decompose_groups_named_thresholds_across_features() {
        let mut declared = ThresholdsByFeature::new();
        declared.insert(
            Feature::new("A"),
            BTreeSet::from([value(5.0).with_label("flood"), value(1.0)]),
        );
        declared.insert(
            Feature::new("B"),
            BTreeSet::from([value(7.0).with_label("flood"), value(1.0)]),
        );
        declared.insert(Feature::new("C"), BTreeSet::from([value(2.0)]));

        let groups = decompose(&declared);
        assert_eq!(groups.len(), 3);
        let flood = groups
            .iter()
            .find(|group| group.values().all(|t| t.label() == Some("flood")))
            .expect("flood group present");
        assert_eq!(flood.len(), 2);
        let shared = groups
            .iter()
            .find(|group| group.values().all(|t| *t == value(1.0)))
            .expect("shared unnamed group present");
        assert_eq!(shared.keys().cloned().collect::<Vec<_>>(), vec![Feature::new("A"), Feature::new("B")]);
    }

    #[test]
    fn decompose_groups_unnamed_probabilities() {
        let mut declared = ThresholdsByFeature::new();
        declared.insert(
            Feature::new("A"),
            BTreeSet::from([probability(0.9).with_values(Bounds::One(3.0)).expect("attach")]),
        );
        declared.insert(
            Feature::new("B"),
            BTreeSet::from([probability(0.9).with_values(Bounds::One(30.0)).expect("attach")]),
        );
        let groups = decompose(&declared);
        assert_eq!(groups.len(), 1);
        let composed = compose(groups[0].values()).expect("same operator and type");
        assert_eq!(composed.probabilities(), Some(Bounds::One(0.9)));
        assert_eq!(composed.values(), None);
    }

    #[test]
    fn compose_of_quantiles_keeps_the_shared_probability_only() {
        let a = probability(0.9)
            .with_values(Bounds::One(5.0))
            .expect("attach")
            .with_label("q90");
        let b = probability(0.9)
            .with_values(Bounds::One(7.0))
            .expect("attach")
            .with_label("q90");
        let composed = compose([&a, &b]).expect("quantiles compose");
        assert_eq!(composed.values(), None);
        assert_eq!(composed.probabilities(), Some(Bounds::One(0.9)));
        assert_eq!(composed.label(), Some("q90"));
    }

    #[test]
    fn compose_ignores_absent_attributes() {
        let with_units = value(1.0).with_label("x").with_units("CMS");
        let without_units = value(2.0).with_label("x");
        let composed = compose([&with_units, &without_units]).expect("compatible");
        assert_eq!(composed.units(), Some("CMS"));
        assert_eq!(composed.label(), Some("x"));
        assert!(composed.values().is_some_and(|v| v.first().is_nan()));

        let bare = probability(0.5);
        let resolved = probability(0.5).with_values(Bounds::One(4.0)).expect("attach");
        let composed = compose([&bare, &resolved]).expect("compatible");
        assert_eq!(composed.values(), Some(Bounds::One(4.0)));
        assert_eq!(composed.probabilities(), Some(Bounds::One(0.5)));
    }

    #[test]
    fn compose_uses_a_probability_placeholder_when_nothing_is_shared() {
        let a = probability(0.5).with_values(Bounds::One(1.0)).expect("attach");
        let b = probability(0.9).with_values(Bounds::One(2.0)).expect("attach");
        let composed = compose([&a, &b]).expect("compatible");
        assert_eq!(composed.values(), None);
        assert!(composed.probabilities().is_some_and(|p| p.first().is_nan()));
    }

    #[test]
    fn compose_keeps_shared_attributes_and_rejects_conflicts() {
        let a = value(5.0).with_label("flood").with_units("CMS");
        let b = value(7.0).with_label("flood").with_units("CMS");
        let composed = compose([&a, &b]).expect("compatible thresholds compose");
        assert_eq!(composed.label(), Some("flood"));
        assert_eq!(composed.units(), Some("CMS"));
        assert_eq!(composed.operator(), ThresholdOperator::Greater);

        assert_eq!(compose([&a]).expect("single threshold"), a);
        assert!(compose(std::iter::empty::<&Threshold>()).is_err());

        let less = Threshold::value(
            ThresholdOperator::Less,
            Bounds::One(5.0),
            ThresholdOrientation::Left,
        )
        .expect("less threshold should build");
        assert!(compose([&a, &less]).is_err());
    }

    #[test]
    fn compose_of_identical_members_is_the_member() {
        let mut group = BTreeMap::new();
        group.insert(Feature::new("A"), value(1.0));
        group.insert(Feature::new("B"), value(1.0));
        assert_eq!(compose(group.values()).expect("identical members"), value(1.0));
    }
}
