use chardiff_core::util::extract;
use serde_json::{json, Value};

/// A level 4 elf wizard with every subtree populated
#[allow(dead_code)]
pub fn base_character() -> Value {
    json!({
        "character_info": {
            "name": "Vex",
            "level": 4,
            "class": "Wizard",
            "race": "Elf",
            "background": "Sage",
            "alignment": "Neutral Good",
            "experience": 2700,
            "hit_points": 22
        },
        "abilities": {
            "strength": 8,
            "dexterity": 14,
            "constitution": 12,
            "intelligence": {"score": 17},
            "wisdom": 12,
            "charisma": 10
        },
        "skills": [
            {"name": "Arcana", "proficient": true, "bonus": 5},
            {"name": "History", "proficient": true, "bonus": 5},
            {"name": "Stealth", "proficient": false, "bonus": 2}
        ],
        "combat": {
            "armor_class": 12,
            "max_hit_points": 22,
            "attacks": [
                {"name": "Dagger", "attack_bonus": 4, "damage": "1d4+2"}
            ],
            "resources": [
                {"name": "Arcane Recovery", "class": "Wizard", "maximum": 1, "used": 0}
            ]
        },
        "spellcasting": {
            "spell_slots": [0, 4, 3, 0, 0, 0, 0, 0, 0, 0],
            "spells": {"wizard": ["Fire Bolt", "Magic Missile", "Shield"]}
        },
        "equipment": [
            {"name": "Quarterstaff", "equipped": true},
            {"name": "Spellbook"},
            {"name": "Torch", "quantity": 5}
        ],
        "features": {
            "class_features": ["Arcane Recovery"],
            "racial_traits": ["Darkvision"],
            "feats": []
        }
    })
}

/// Builds variations of [`base_character`] one path at a time.
#[allow(dead_code)]
pub struct CharacterBuilder {
    state: Value,
}

#[allow(dead_code)]
impl CharacterBuilder {
    pub fn new() -> Self {
        Self {
            state: base_character(),
        }
    }

    pub fn empty() -> Self {
        Self { state: json!({}) }
    }

    /// Overwrite the value at a dotted path, creating parents as needed
    pub fn set(mut self, field_path: &str, value: Value) -> Self {
        extract::set_path(&mut self.state, field_path, value);
        self
    }

    pub fn build(self) -> Value {
        self.state
    }
}

/// Field paths of a change list, in order
#[allow(dead_code)]
pub fn paths(changes: &[chardiff_core::FieldChange]) -> Vec<&str> {
    changes.iter().map(|c| c.field_path.as_str()).collect()
}
