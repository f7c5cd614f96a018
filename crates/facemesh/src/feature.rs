use serde::{Deserialize, Serialize};

/// Material tag carried by surfaces and accessories, as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const SKIN: Color = Color(0xc68642);
    pub const LIPS: Color = Color(0x8b160e);
    pub const BROW: Color = Color(0x654321);
    pub const EYE_SHADOW: Color = Color(0xff69b4);
    pub const EYE_WHITE: Color = Color(0xffffff);
    pub const IRIS: Color = Color(0x313456);
    pub const PUPIL: Color = Color(0x111111);

    pub fn rgb(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

/// How a feature's landmark set is derived from its annotation groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    /// Only the landmarks listed in the groups.
    #[default]
    Union,
    /// The listed landmarks plus everything the outline cuts off from the
    /// face silhouette.
    Enclosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub key: String,
    pub groups: Vec<String>,
    #[serde(default)]
    pub region: Region,
    pub color: Color,
}

impl FeatureDef {
    pub fn new(key: &str, groups: &[&str], color: Color) -> Self {
        Self {
            key: key.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            region: Region::Union,
            color,
        }
    }

    pub fn enclosed(mut self) -> Self {
        self.region = Region::Enclosed;
        self
    }
}

/// A point decoration placed at the centre of its groups' landmarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryDef {
    pub key: String,
    pub groups: Vec<String>,
    pub color: Color,
}

impl AccessoryDef {
    pub fn new(key: &str, groups: &[&str], color: Color) -> Self {
        Self {
            key: key.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            color,
        }
    }
}

/// Everything that gets drawn for one face besides the skin plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCatalog {
    pub skin_color: Color,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
    #[serde(default)]
    pub accessories: Vec<AccessoryDef>,
}

impl FeatureCatalog {
    pub fn empty() -> Self {
        Self {
            skin_color: Color::SKIN,
            features: Vec::new(),
            accessories: Vec::new(),
        }
    }

    pub fn feature(&self, key: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.key == key)
    }

    pub fn accessory(&self, key: &str) -> Option<&AccessoryDef> {
        self.accessories.iter().find(|a| a.key == key)
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        let mut features = vec![
            FeatureDef::new("lipsOuter", &["lipsUpperOuter", "lipsLowerOuter"], Color::LIPS),
            FeatureDef::new("lips", &["lipsUpperOuter", "lipsLowerOuter"], Color::LIPS).enclosed(),
            FeatureDef::new("rightEyebrow", &["rightEyebrowUpper", "rightEyebrowLower"], Color::BROW),
            FeatureDef::new("leftEyebrow", &["leftEyebrowUpper", "leftEyebrowLower"], Color::BROW),
        ];

        // Each eye ring covers the rings inside it, so the outer rims are
        // drawn first and the inner ones layer over them.
        for side in ["right", "left"] {
            let ring = |n: u32| [format!("{side}EyeUpper{n}"), format!("{side}EyeLower{n}")];
            let rings = |upto: u32| (0..=upto).flat_map(ring).collect::<Vec<_>>();

            let mut rim = rings(2);
            rim.push(format!("{side}EyeLower3"));
            features.push(eye(format!("{side}Eye3"), rim, Color::EYE_SHADOW));
            features.push(eye(format!("{side}Eye2"), rings(2), Color::LIPS));
            features.push(eye(format!("{side}Eye1"), rings(1), Color::EYE_WHITE));
            features.push(eye(format!("{side}Eye0"), rings(0), Color::IRIS));
        }

        Self {
            skin_color: Color::SKIN,
            features,
            accessories: vec![
                AccessoryDef::new("rightPupil", &["rightEyeUpper0", "rightEyeLower0"], Color::PUPIL),
                AccessoryDef::new("leftPupil", &["leftEyeUpper0", "leftEyeLower0"], Color::PUPIL),
            ],
        }
    }
}

fn eye(key: String, groups: Vec<String>, color: Color) -> FeatureDef {
    FeatureDef {
        key,
        groups,
        region: Region::Union,
        color,
    }
}
