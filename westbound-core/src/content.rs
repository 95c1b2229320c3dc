//! Built-in content tables: enemy packs, items, skills.
//!
//! Content is compiled in. Unknown pack ids fall back to the default pack,
//! so a mangled directive can never strand a combat session without
//! enemies.

use crate::directive::Attribute;
use lazy_static::lazy_static;

/// Pack id used whenever a requested pack is unknown or empty.
pub const DEFAULT_PACK_ID: &str = "bandits_1";

/// Blueprint for one enemy in an encounter.
#[derive(Debug, Clone)]
pub struct EnemySpec {
    pub name: String,
    pub hp: i32,
    pub ac: i32,
    pub attack_dc: i32,
    pub dmg: i32,
    /// Inclusive gold range rolled when the enemy dies.
    pub loot_gold: (i32, i32),
}

impl EnemySpec {
    pub fn new(name: impl Into<String>, hp: i32, ac: i32, dmg: i32) -> Self {
        Self {
            name: name.into(),
            hp,
            ac,
            attack_dc: ac,
            dmg,
            loot_gold: (1, 5),
        }
    }

    pub fn with_attack_dc(mut self, attack_dc: i32) -> Self {
        self.attack_dc = attack_dc;
        self
    }

    pub fn with_loot(mut self, lo: i32, hi: i32) -> Self {
        self.loot_gold = (lo, hi);
        self
    }
}

/// One wave of enemies within a pack.
#[derive(Debug, Clone)]
pub struct EncounterSpec {
    pub enemies: Vec<EnemySpec>,
    /// Fixed round limit; rolled as 1d3+1 when absent.
    pub max_round: Option<i32>,
}

impl EncounterSpec {
    pub fn new(enemies: Vec<EnemySpec>) -> Self {
        Self {
            enemies,
            max_round: None,
        }
    }

    pub fn with_max_round(mut self, max_round: i32) -> Self {
        self.max_round = Some(max_round);
        self
    }
}

/// An ordered sequence of encounters resolved within one combat session.
#[derive(Debug, Clone)]
pub struct EnemyPack {
    pub id: String,
    pub name: String,
    pub encounters: Vec<EncounterSpec>,
}

impl EnemyPack {
    pub fn new(id: impl Into<String>, name: impl Into<String>, encounters: Vec<EncounterSpec>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            encounters,
        }
    }
}

/// Item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Weapon,
    Consumable,
}

/// Timed markers a consumable can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    FleeSuccess,
    EnemyPenalty,
}

/// An item definition.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub id: String,
    pub kind: ItemKind,
    pub roll_bonus: i32,
    pub heal: i32,
    pub duration: i32,
    pub effect: Option<ItemEffect>,
}

impl ItemDef {
    pub fn weapon(id: impl Into<String>, roll_bonus: i32) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Weapon,
            roll_bonus,
            heal: 0,
            duration: 0,
            effect: None,
        }
    }

    pub fn consumable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Consumable,
            roll_bonus: 0,
            heal: 0,
            duration: 1,
            effect: None,
        }
    }

    pub fn with_heal(mut self, heal: i32) -> Self {
        self.heal = heal;
        self
    }

    pub fn with_buff(mut self, roll_bonus: i32, duration: i32) -> Self {
        self.roll_bonus = roll_bonus;
        self.duration = duration;
        self
    }

    pub fn with_effect(mut self, effect: ItemEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// A combat skill definition.
#[derive(Debug, Clone)]
pub struct SkillDef {
    pub id: String,
    pub attribute: Attribute,
    pub roll_bonus: i32,
    pub extra_damage: i32,
    pub cooldown: i32,
}

impl SkillDef {
    pub fn new(id: impl Into<String>, attribute: Attribute, roll_bonus: i32, cooldown: i32) -> Self {
        Self {
            id: id.into(),
            attribute,
            roll_bonus,
            extra_damage: 0,
            cooldown,
        }
    }

    pub fn with_extra_damage(mut self, extra_damage: i32) -> Self {
        self.extra_damage = extra_damage;
        self
    }
}

lazy_static! {
    /// Built-in encounter packs.
    pub static ref ENEMY_PACKS: Vec<EnemyPack> = vec![
        EnemyPack::new(
            "bandits_1",
            "Bandit Ambush",
            vec![
                EncounterSpec::new(vec![
                    EnemySpec::new("Bandit Scout", 2, 12, 1).with_loot(3, 8),
                ]),
                EncounterSpec::new(vec![
                    EnemySpec::new("Bandit Hound", 1, 11, 1).with_loot(1, 5),
                    EnemySpec::new("Bandit Raider", 2, 12, 1).with_loot(2, 7),
                ]),
            ],
        ),
        EnemyPack::new(
            "goblin_road",
            "Goblins on the Road",
            vec![
                EncounterSpec::new(vec![
                    EnemySpec::new("Goblin Forager", 2, 11, 1).with_loot(2, 6),
                ]),
                EncounterSpec::new(vec![
                    EnemySpec::new("Goblin Waylayer", 2, 12, 1).with_loot(3, 7),
                    EnemySpec::new("Goblin Cur", 1, 10, 1).with_loot(1, 4),
                ]),
            ],
        ),
    ];

    /// Built-in items.
    pub static ref ITEMS: Vec<ItemDef> = vec![
        ItemDef::weapon("dagger", 1),
        ItemDef::consumable("healing_herbs").with_heal(2),
        ItemDef::consumable("buff_potion").with_buff(2, 1),
        ItemDef::consumable("incense_charm").with_buff(1, 2),
        ItemDef::consumable("smoke_bomb").with_effect(ItemEffect::FleeSuccess),
        ItemDef::consumable("ward_talisman").with_effect(ItemEffect::EnemyPenalty),
    ];

    /// Built-in combat skills.
    pub static ref SKILLS: Vec<SkillDef> = vec![
        SkillDef::new("power_strike", Attribute::Body, 2, 2).with_extra_damage(1),
        SkillDef::new("steady_mind", Attribute::Spirit, 2, 2),
        SkillDef::new("focus_charm", Attribute::Mind, 2, 2),
        SkillDef::new("quick_shot", Attribute::Luck, 1, 2).with_extra_damage(1),
    ];

    /// Skills available to each character class.
    pub static ref CLASS_SKILLS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("martial", vec!["power_strike"]),
        ("pilgrim_monk", vec!["steady_mind"]),
        ("talismanist", vec!["focus_charm"]),
        ("wanderer", vec!["quick_shot"]),
    ];
}

/// Look up a pack by id.
pub fn enemy_pack(id: &str) -> Option<&'static EnemyPack> {
    ENEMY_PACKS.iter().find(|pack| pack.id == id)
}

/// The pack used when a requested id is unknown or empty.
pub fn default_pack() -> &'static EnemyPack {
    enemy_pack(DEFAULT_PACK_ID).expect("default enemy pack must exist")
}

/// Look up an item by id.
pub fn item(id: &str) -> Option<&'static ItemDef> {
    ITEMS.iter().find(|item| item.id == id)
}

/// Look up a skill by id.
pub fn skill(id: &str) -> Option<&'static SkillDef> {
    SKILLS.iter().find(|skill| skill.id == id)
}

/// Skill ids a class may use; empty for unknown classes.
pub fn class_skills(class_id: &str) -> &'static [&'static str] {
    CLASS_SKILLS
        .iter()
        .find(|(id, _)| *id == class_id)
        .map(|(_, skills)| skills.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pack_exists_and_is_bounded() {
        let pack = default_pack();
        assert_eq!(pack.id, DEFAULT_PACK_ID);
        assert!(!pack.encounters.is_empty());
        assert!(pack.encounters.len() <= 3);
    }

    #[test]
    fn test_unknown_lookups_return_none() {
        assert!(enemy_pack("no_such_pack").is_none());
        assert!(item("no_such_item").is_none());
        assert!(skill("no_such_skill").is_none());
        assert!(class_skills("no_such_class").is_empty());
    }

    #[test]
    fn test_every_class_skill_is_defined() {
        for (_, skills) in CLASS_SKILLS.iter() {
            for id in skills {
                assert!(skill(id).is_some(), "missing skill definition: {id}");
            }
        }
    }

    #[test]
    fn test_loot_ranges_are_ordered() {
        for pack in ENEMY_PACKS.iter() {
            for encounter in &pack.encounters {
                for enemy in &encounter.enemies {
                    assert!(enemy.loot_gold.0 <= enemy.loot_gold.1);
                }
            }
        }
    }
}
