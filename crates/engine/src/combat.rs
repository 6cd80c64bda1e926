use serde::Serialize;

/// Cooldown gate for one action (attack, special ability, interaction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSlot {
    cooldown_seconds: f64,
    last_used_seconds: Option<f64>,
}

impl ActionSlot {
    pub fn new(cooldown_seconds: f64) -> Self {
        Self {
            cooldown_seconds: cooldown_seconds.max(0.0),
            last_used_seconds: None,
        }
    }

    pub fn cooldown_seconds(&self) -> f64 {
        self.cooldown_seconds
    }

    pub fn set_cooldown_seconds(&mut self, cooldown_seconds: f64) {
        self.cooldown_seconds = cooldown_seconds.max(0.0);
    }

    pub fn last_used_seconds(&self) -> Option<f64> {
        self.last_used_seconds
    }

    pub fn can_perform(&self, now_seconds: f64) -> bool {
        match self.last_used_seconds {
            Some(last_used) => now_seconds - last_used >= self.cooldown_seconds,
            None => true,
        }
    }

    /// Records a use at `now_seconds`. Returns false and changes nothing while on cooldown.
    pub fn try_perform(&mut self, now_seconds: f64) -> bool {
        if !self.can_perform(now_seconds) {
            return false;
        }
        self.last_used_seconds = Some(now_seconds);
        true
    }

    pub fn remaining_seconds(&self, now_seconds: f64) -> f64 {
        match self.last_used_seconds {
            Some(last_used) => (self.cooldown_seconds - (now_seconds - last_used)).max(0.0),
            None => 0.0,
        }
    }

    /// 0.0 right after use, 1.0 once ready again.
    pub fn readiness(&self, now_seconds: f64) -> f32 {
        if self.cooldown_seconds <= 0.0 {
            return 1.0;
        }
        let remaining = self.remaining_seconds(now_seconds);
        (1.0 - remaining / self.cooldown_seconds).clamp(0.0, 1.0) as f32
    }

    pub fn reset(&mut self) {
        self.last_used_seconds = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageOutcome {
    /// Target already dead.
    Ignored,
    Damaged { dealt: u32, remaining: u32 },
    Killed { dealt: u32 },
}

/// Health and armor shared by every actor kind. Death is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Combatant {
    health: u32,
    max_health: u32,
    armor: u32,
    alive: bool,
}

impl Combatant {
    pub fn new(max_health: u32) -> Self {
        Self {
            health: max_health,
            max_health,
            armor: 0,
            alive: max_health > 0,
        }
    }

    pub fn with_armor(mut self, armor: u32) -> Self {
        self.armor = armor;
        self
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn armor(&self) -> u32 {
        self.armor
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn apply_damage(&mut self, raw_damage: u32) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::Ignored;
        }
        let dealt = raw_damage.saturating_sub(self.armor).min(self.health);
        self.health -= dealt;
        if self.health == 0 {
            self.alive = false;
            return DamageOutcome::Killed { dealt };
        }
        DamageOutcome::Damaged {
            dealt,
            remaining: self.health,
        }
    }

    /// Returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.alive {
            return 0;
        }
        let healed = amount.min(self.max_health - self.health);
        self.health += healed;
        healed
    }

    pub fn set_max_health(&mut self, max_health: u32) {
        self.max_health = max_health;
        self.health = self.health.min(max_health);
        if self.health == 0 {
            self.alive = false;
        }
    }
}
