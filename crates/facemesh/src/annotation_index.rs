use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::annotations::AnnotationGroups;
use crate::error::MeshError;
use crate::feature::{Color, FeatureCatalog, Region};
use crate::surface::Weld;
use crate::triangulation::Triangulation;

/// Key of the base surface that covers the whole triangulation.
pub const SKIN: &str = "skin";

const SILHOUETTE: &str = "silhouette";

/// Triangle positions (into the triangulation) that make up one feature.
#[derive(Debug, Clone)]
pub struct FeatureTriangleSet {
    key: String,
    color: Color,
    positions: Arc<[u32]>,
    points: BTreeSet<u32>,
    weld: Arc<Weld>,
}

impl FeatureTriangleSet {
    pub fn new(key: &str, triangulation: &Triangulation, mut positions: Vec<u32>, points: BTreeSet<u32>) -> Self {
        positions.sort_unstable();
        positions.dedup();
        let weld = Arc::new(Weld::new(triangulation, &positions));
        Self {
            key: key.to_string(),
            color: Color::SKIN,
            positions: positions.into(),
            points,
            weld,
        }
    }

    fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Sorted ascending.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub(crate) fn positions_shared(&self) -> Arc<[u32]> {
        self.positions.clone()
    }

    pub fn contains(&self, position: u32) -> bool {
        self.positions.binary_search(&position).is_ok()
    }

    /// Landmarks the membership test was run against.
    pub fn points(&self) -> &BTreeSet<u32> {
        &self.points
    }

    pub fn weld(&self) -> &Arc<Weld> {
        &self.weld
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Landmarks whose bounding-box centre positions an accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryPoints {
    pub key: String,
    pub points: Vec<u32>,
    pub color: Color,
}

/// Precomputed feature geometry shared read-only by every face instance.
#[derive(Debug)]
pub struct AnnotationIndex {
    triangulation: Triangulation,
    groups: AnnotationGroups,
    skin: FeatureTriangleSet,
    features: Vec<FeatureTriangleSet>,
    accessories: Vec<AccessoryPoints>,
}

impl AnnotationIndex {
    pub fn canonical() -> Result<Self, MeshError> {
        Self::build(
            Triangulation::canonical(),
            AnnotationGroups::canonical(),
            &FeatureCatalog::default(),
        )
    }

    /// Validates the tables and derives every feature's triangle set.
    pub fn build(
        triangulation: Triangulation,
        groups: AnnotationGroups,
        catalog: &FeatureCatalog,
    ) -> Result<Self, MeshError> {
        triangulation.validate()?;
        groups.validate()?;

        let mut seen = BTreeSet::from([SKIN]);
        for feature in &catalog.features {
            if !seen.insert(feature.key.as_str()) {
                return Err(MeshError::DuplicateFeature(feature.key.clone()));
            }
        }
        let mut seen = BTreeSet::new();
        for accessory in &catalog.accessories {
            if !seen.insert(accessory.key.as_str()) {
                return Err(MeshError::DuplicateFeature(accessory.key.clone()));
            }
        }

        let skin = FeatureTriangleSet::new(
            SKIN,
            &triangulation,
            (0..triangulation.len() as u32).collect(),
            triangulation.triangles().iter().flatten().copied().collect(),
        )
        .with_color(catalog.skin_color);

        let mut adjacency = None;
        let mut features = Vec::with_capacity(catalog.features.len());
        for feature in &catalog.features {
            let mut points = union_of(&groups, &feature.groups)?;
            if feature.region == Region::Enclosed {
                let seeds = groups
                    .get(SILHOUETTE)
                    .ok_or_else(|| MeshError::UnknownAnnotationGroup(SILHOUETTE.to_string()))?;
                let adjacency = adjacency.get_or_insert_with(|| triangulation.adjacency());
                let enclosed = enclosed_points(adjacency, &points, seeds);
                points.extend(enclosed);
            }
            let positions = triangles_within(&triangulation, &points);
            debug!(feature = %feature.key, triangles = positions.len(), "derived feature triangle set");
            features.push(
                FeatureTriangleSet::new(&feature.key, &triangulation, positions, points)
                    .with_color(feature.color),
            );
        }

        let accessories = catalog
            .accessories
            .iter()
            .map(|accessory| {
                let mut points = Vec::new();
                for name in &accessory.groups {
                    let group = groups
                        .get(name)
                        .ok_or_else(|| MeshError::UnknownAnnotationGroup(name.clone()))?;
                    for index in group {
                        if !points.contains(index) {
                            points.push(*index);
                        }
                    }
                }
                Ok(AccessoryPoints {
                    key: accessory.key.clone(),
                    points,
                    color: accessory.color,
                })
            })
            .collect::<Result<Vec<_>, MeshError>>()?;

        Ok(Self {
            triangulation,
            groups,
            skin,
            features,
            accessories,
        })
    }

    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    pub fn groups(&self) -> &AnnotationGroups {
        &self.groups
    }

    pub fn skin(&self) -> &FeatureTriangleSet {
        &self.skin
    }

    pub fn features(&self) -> &[FeatureTriangleSet] {
        &self.features
    }

    /// The skin set for [`SKIN`], otherwise the named feature.
    pub fn feature(&self, key: &str) -> Option<&FeatureTriangleSet> {
        if key == SKIN {
            return Some(&self.skin);
        }
        self.features.iter().find(|f| f.key == key)
    }

    pub fn accessories(&self) -> &[AccessoryPoints] {
        &self.accessories
    }

    pub fn accessory(&self, key: &str) -> Option<&AccessoryPoints> {
        self.accessories.iter().find(|a| a.key == key)
    }
}

fn union_of(groups: &AnnotationGroups, names: &[String]) -> Result<BTreeSet<u32>, MeshError> {
    let mut points = BTreeSet::new();
    for name in names {
        let group = groups
            .get(name)
            .ok_or_else(|| MeshError::UnknownAnnotationGroup(name.clone()))?;
        points.extend(group.iter().copied());
    }
    Ok(points)
}

/// Positions of the triangles whose three corners all lie in `points`.
pub fn triangles_within(triangulation: &Triangulation, points: &BTreeSet<u32>) -> Vec<u32> {
    triangulation
        .triangles()
        .iter()
        .enumerate()
        .filter(|(_, tri)| tri.iter().all(|i| points.contains(i)))
        .map(|(t, _)| t as u32)
        .collect()
}

/// Landmarks cut off from `seeds` by `outline` in the mesh graph.
///
/// Flood-fills from the seeds without stepping onto outline landmarks;
/// whatever the fill never reaches lies inside the outline.
fn enclosed_points(adjacency: &[BTreeSet<u32>], outline: &BTreeSet<u32>, seeds: &[u32]) -> BTreeSet<u32> {
    let mut reached = vec![false; adjacency.len()];
    let mut stack: Vec<u32> = seeds.iter().copied().filter(|s| !outline.contains(s)).collect();
    for &seed in &stack {
        reached[seed as usize] = true;
    }

    while let Some(landmark) = stack.pop() {
        for &next in &adjacency[landmark as usize] {
            if !reached[next as usize] && !outline.contains(&next) {
                reached[next as usize] = true;
                stack.push(next);
            }
        }
    }

    (0..adjacency.len() as u32)
        .filter(|i| !reached[*i as usize] && !outline.contains(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::feature::{AccessoryDef, FeatureDef};

    fn lips_catalog() -> FeatureCatalog {
        FeatureCatalog {
            features: vec![FeatureDef::new(
                "lipsOuter",
                &["lipsUpperOuter", "lipsLowerOuter"],
                Color::LIPS,
            )],
            ..FeatureCatalog::empty()
        }
    }

    #[test]
    fn test_positions_are_sorted_and_deduplicated() {
        let triangulation = Triangulation::from_triangles(vec![[0, 1, 2], [1, 2, 3], [2, 3, 4]]);
        let set = FeatureTriangleSet::new("band", &triangulation, vec![2, 0, 1, 2], BTreeSet::new());
        assert_eq!(set.positions(), &[0, 1, 2]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.weld().slot_count(), 9);
        assert!(set.contains(2));
        assert!(set.contains(0));
        assert!(!set.contains(3));
    }

    #[test]
    fn test_lips_outer_membership_requires_all_three_corners() {
        let triangulation = Triangulation::from_triangles(vec![
            [61, 185, 146], // all outer lip landmarks
            [61, 185, 78],  // 78 is on the inner lip line
            [0, 17, 291],   // upper and lower outer mixed
            [1, 2, 98],     // nose
        ]);
        let index =
            AnnotationIndex::build(triangulation, AnnotationGroups::canonical(), &lips_catalog()).unwrap();
        let lips = index.feature("lipsOuter").unwrap();
        assert_eq!(lips.positions(), &[0, 2]);
        assert!(lips.contains(0));
        assert!(!lips.contains(1));
    }

    #[test]
    fn test_derivation_is_deterministic_and_order_independent() {
        let forward = AnnotationIndex::canonical().unwrap();
        let again = AnnotationIndex::canonical().unwrap();

        let mut reversed_catalog = FeatureCatalog::default();
        for feature in &mut reversed_catalog.features {
            feature.groups.reverse();
        }
        reversed_catalog.features.reverse();
        let reversed = AnnotationIndex::build(
            Triangulation::canonical(),
            AnnotationGroups::canonical(),
            &reversed_catalog,
        )
        .unwrap();

        for feature in forward.features() {
            assert_eq!(feature.positions(), again.feature(feature.key()).unwrap().positions());
            assert_eq!(feature.positions(), reversed.feature(feature.key()).unwrap().positions());
        }
    }

    #[rstest]
    #[case("lipsOuter", 0)]
    #[case("lips", 120)]
    #[case("rightEyebrow", 10)]
    #[case("leftEyebrow", 10)]
    #[case("rightEye0", 14)]
    #[case("rightEye1", 46)]
    #[case("rightEye2", 78)]
    #[case("rightEye3", 93)]
    #[case("leftEye0", 14)]
    #[case("leftEye1", 46)]
    #[case("leftEye2", 78)]
    #[case("leftEye3", 93)]
    fn test_canonical_feature_sizes(#[case] key: &str, #[case] triangles: usize) {
        let index = AnnotationIndex::canonical().unwrap();
        assert_eq!(index.feature(key).unwrap().len(), triangles);
    }

    #[test]
    fn test_skin_covers_whole_triangulation() {
        let index = AnnotationIndex::canonical().unwrap();
        assert_eq!(index.skin().len(), 880);
        assert_eq!(index.feature(SKIN).unwrap().len(), 880);
        assert_eq!(index.skin().color(), Color::SKIN);
    }

    #[test]
    fn test_triangles_may_belong_to_several_features() {
        let index = AnnotationIndex::canonical().unwrap();
        let inner = index.feature("rightEye0").unwrap();
        let outer = index.feature("rightEye1").unwrap();
        assert!(inner.positions().iter().all(|&t| outer.contains(t)));
    }

    #[test]
    fn test_enclosed_lips_include_inner_lip_line() {
        let index = AnnotationIndex::canonical().unwrap();
        let lips = index.feature("lips").unwrap();
        for inner in [78, 13, 14, 308] {
            assert!(lips.points().contains(&inner));
        }
        // Nose and chin stay outside.
        assert!(!lips.points().contains(&1));
        assert!(!lips.points().contains(&152));
    }

    #[test]
    fn test_enclosed_without_silhouette_fails() {
        let mut groups = AnnotationGroups::default();
        groups.insert("ring", vec![0, 1, 2]);
        let catalog = FeatureCatalog {
            features: vec![FeatureDef::new("ring", &["ring"], Color::LIPS).enclosed()],
            ..FeatureCatalog::empty()
        };
        let err = AnnotationIndex::build(Triangulation::canonical(), groups, &catalog).unwrap_err();
        assert_eq!(err, MeshError::UnknownAnnotationGroup("silhouette".to_string()));
    }

    #[test]
    fn test_unknown_group_fails_at_build() {
        let catalog = FeatureCatalog {
            features: vec![FeatureDef::new("nose", &["noseBridge"], Color::SKIN)],
            ..FeatureCatalog::empty()
        };
        let err = AnnotationIndex::build(Triangulation::canonical(), AnnotationGroups::canonical(), &catalog)
            .unwrap_err();
        assert_eq!(err, MeshError::UnknownAnnotationGroup("noseBridge".to_string()));
    }

    #[rstest]
    #[case("skin")]
    #[case("lipsOuter")]
    fn test_duplicate_feature_keys_fail(#[case] key: &str) {
        let mut catalog = lips_catalog();
        catalog.features.push(FeatureDef::new(key, &["noseTip"], Color::SKIN));
        let err = AnnotationIndex::build(Triangulation::canonical(), AnnotationGroups::canonical(), &catalog)
            .unwrap_err();
        assert_eq!(err, MeshError::DuplicateFeature(key.to_string()));
    }

    #[test]
    fn test_out_of_range_triangulation_fails_at_build() {
        let triangulation = Triangulation::from_triangles(vec![[0, 1, 500]]);
        let err = AnnotationIndex::build(triangulation, AnnotationGroups::canonical(), &FeatureCatalog::empty())
            .unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { index: 500, .. }));
    }

    #[test]
    fn test_accessory_points_keep_group_order_without_duplicates() {
        let mut groups = AnnotationGroups::default();
        groups.insert("upper", vec![5, 6, 7]);
        groups.insert("lower", vec![7, 8, 5]);
        let catalog = FeatureCatalog {
            accessories: vec![AccessoryDef::new("dot", &["upper", "lower"], Color::PUPIL)],
            ..FeatureCatalog::empty()
        };
        let index = AnnotationIndex::build(Triangulation::canonical(), groups, &catalog).unwrap();
        assert_eq!(index.accessory("dot").unwrap().points, vec![5, 6, 7, 8]);
    }
}
