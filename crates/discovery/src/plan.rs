//! Plan-derived visibility.
//!
//! Only the resulting booleans matter here; plan administration lives in
//! the backend.

use crate::model::{PlanValue, VisibilityFlags};

/// Highest plan level.
pub const MAX_PLAN_LEVEL: u8 = 3;

/// Verification states that count as a verified owner.
const VERIFIED_STATES: [&str; 4] = [
    "otp_verificado",
    "sms_verificado",
    "messenger_verificado",
    "manual_aprobado",
];

/// What a record is allowed to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Visibility {
    /// Effective plan level, `0..=3`
    pub level: u8,
    /// Has a public profile
    pub permite_perfil: bool,
    /// Appears in proximity results
    pub aparece_en_cercanos: bool,
    /// Shows a menu
    pub permite_menu: bool,
    /// Shows specials
    pub permite_especiales: bool,
    /// Accepts online orders
    pub permite_ordenes: bool,
}

impl Visibility {
    /// Flags implied by a plan level alone.
    pub fn for_level(level: u8) -> Self {
        let level = level.min(MAX_PLAN_LEVEL);
        Self {
            level,
            permite_perfil: level >= 1,
            aparece_en_cercanos: level >= 1,
            permite_menu: level >= 2,
            permite_especiales: level >= 2,
            permite_ordenes: level >= 3,
        }
    }
}

/// Level for a numeric or named plan value. Unknown names are level 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn plan_level(value: &PlanValue) -> u8 {
    match value {
        PlanValue::Level(n) if n.is_finite() => n.round().clamp(0.0, f64::from(MAX_PLAN_LEVEL)) as u8,
        PlanValue::Level(_) => 0,
        PlanValue::Name(name) => {
            let trimmed = name.trim();
            if let Ok(n) = trimmed.replace(',', ".").parse::<f64>() {
                return plan_level(&PlanValue::Level(n));
            }
            let slug = trimmed.to_lowercase();
            if slug.contains("basic") {
                0
            } else if slug.contains("regular") {
                1
            } else if slug.contains("plus") {
                2
            } else if slug.contains("premium") {
                3
            } else {
                0
            }
        }
    }
}

/// Resolves the effective visibility of a record.
///
/// A record with neither a plan nor any explicit flag is treated as level 1.
/// Explicit booleans override the level-derived ones. Ownership signals, when
/// present and unverified, hide everything.
pub fn resolve_visibility(flags: &VisibilityFlags) -> Visibility {
    let plan_value = flags.plan_nivel.as_ref().filter(|v| match v {
        PlanValue::Name(s) => !s.trim().is_empty(),
        PlanValue::Level(_) => true,
    });

    let has_explicit_flags = [
        flags.permite_perfil,
        flags.aparece_en_cercanos,
        flags.permite_menu,
        flags.permite_especiales,
        flags.permite_ordenes,
    ]
    .iter()
    .any(Option::is_some);

    let has_explicit_plan = plan_value.is_some()
        || flags.plan_id.as_ref().is_some_and(|id| !id.is_null())
        || flags.plan_nombre.as_deref().is_some_and(|n| !n.trim().is_empty());

    let level = if has_explicit_plan || has_explicit_flags {
        plan_value.map_or_else(|| plan_level_from_name(flags.plan_nombre.as_deref()), plan_level)
    } else {
        1
    };

    let derived = Visibility::for_level(level);
    if !ownership_verified(flags) {
        return Visibility {
            level: derived.level,
            permite_perfil: false,
            aparece_en_cercanos: false,
            permite_menu: false,
            permite_especiales: false,
            permite_ordenes: false,
        };
    }

    Visibility {
        level: derived.level,
        permite_perfil: flags.permite_perfil.unwrap_or(derived.permite_perfil),
        aparece_en_cercanos: flags.aparece_en_cercanos.unwrap_or(derived.aparece_en_cercanos),
        permite_menu: flags.permite_menu.unwrap_or(derived.permite_menu),
        permite_especiales: flags.permite_especiales.unwrap_or(derived.permite_especiales),
        permite_ordenes: flags.permite_ordenes.unwrap_or(derived.permite_ordenes),
    }
}

fn plan_level_from_name(name: Option<&str>) -> u8 {
    name.map_or(0, |n| plan_level(&PlanValue::Name(n.to_string())))
}

/// Records without ownership signals count as verified.
fn ownership_verified(flags: &VisibilityFlags) -> bool {
    let state = flags
        .estado_propiedad
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();
    let verification = flags
        .estado_verificacion
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    let has_signals =
        !state.is_empty() || !verification.is_empty() || flags.propietario_verificado.is_some();
    if !has_signals {
        return true;
    }

    let verification_ok = VERIFIED_STATES.contains(&verification.as_str());
    state == "verificado" && (verification_ok || flags.propietario_verificado == Some(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> VisibilityFlags {
        VisibilityFlags::default()
    }

    #[test]
    fn test_no_plan_no_flags_is_level_one() {
        let v = resolve_visibility(&flags());
        assert_eq!(v.level, 1);
        assert!(v.aparece_en_cercanos);
        assert!(!v.permite_menu);
    }

    #[test]
    fn test_basic_plan_hidden_from_nearby() {
        let v = resolve_visibility(&VisibilityFlags {
            plan_nivel: Some(PlanValue::Name("basic".into())),
            ..flags()
        });
        assert_eq!(v.level, 0);
        assert!(!v.aparece_en_cercanos);
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(plan_level(&PlanValue::Level(7.0)), 3);
        assert_eq!(plan_level(&PlanValue::Level(-2.0)), 0);
        assert_eq!(plan_level(&PlanValue::Level(1.6)), 2);
        assert_eq!(plan_level(&PlanValue::Name("Findixi Premium".into())), 3);
        assert_eq!(plan_level(&PlanValue::Name("2".into())), 2);
    }

    #[test]
    fn test_explicit_flag_overrides_level() {
        let v = resolve_visibility(&VisibilityFlags {
            plan_nivel: Some(PlanValue::Level(3.0)),
            aparece_en_cercanos: Some(false),
            ..flags()
        });
        assert!(!v.aparece_en_cercanos);
        assert!(v.permite_ordenes);
    }

    #[test]
    fn test_explicit_flag_without_plan_uses_level_zero() {
        let v = resolve_visibility(&VisibilityFlags {
            permite_menu: Some(true),
            ..flags()
        });
        assert_eq!(v.level, 0);
        assert!(v.permite_menu);
        assert!(!v.aparece_en_cercanos);
    }

    #[test]
    fn test_plan_name_only() {
        let v = resolve_visibility(&VisibilityFlags {
            plan_nombre: Some("Findixi Plus".into()),
            ..flags()
        });
        assert_eq!(v.level, 2);
    }

    #[test]
    fn test_unverified_owner_hides_everything() {
        let v = resolve_visibility(&VisibilityFlags {
            plan_nivel: Some(PlanValue::Level(3.0)),
            estado_propiedad: Some("pendiente".into()),
            ..flags()
        });
        assert!(!v.aparece_en_cercanos);
        assert!(!v.permite_perfil);

        let v = resolve_visibility(&VisibilityFlags {
            plan_nivel: Some(PlanValue::Level(1.0)),
            estado_propiedad: Some("verificado".into()),
            estado_verificacion: Some("sms_verificado".into()),
            ..flags()
        });
        assert!(v.aparece_en_cercanos);
    }
}
