//! Verificador de invariantes
//!
//! Roda após cada step. Três checagens, nesta ordem:
//!
//! | checagem   | condição                           | se falhar            |
//! |------------|------------------------------------|----------------------|
//! | simplex    | \|Σpᵢ − 1\| ≤ 1e-6                  | fatal                |
//! | eficiência | η ≤ 2c/(2c+1) + 0.05               | [`Severity`] decide  |
//! | complexity | c_reg ≤ teto                       | fatal                |
//!
//! NaN nunca passa numa checagem.

use tracing::warn;

use crate::config::{Severity, VmConfig};
use crate::error::Violation;
use crate::registration::RegistrationState;

/// Desvio permitido de Σp em relação a 1
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Folga acima do teto teórico de eficiência
pub const EFFICIENCY_SLACK: f64 = 0.05;

/// Resultado de uma passada sem nada fatal
pub type Verdict = Result<Option<Violation>, Violation>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvariantVerifier {
    c_reg_max: f64,
    efficiency: Severity,
}

impl InvariantVerifier {
    pub fn new(c_reg_max: f64, efficiency: Severity) -> Self {
        Self {
            c_reg_max,
            efficiency,
        }
    }

    pub fn from_config(config: &VmConfig) -> Self {
        Self::new(config.c_reg_max, config.efficiency_severity)
    }

    pub fn c_reg_max(&self) -> f64 {
        self.c_reg_max
    }

    pub fn efficiency_severity(&self) -> Severity {
        self.efficiency
    }

    /// Todas as checagens. `Err` é fatal e fica para o chamador reportar;
    /// `Ok(Some(_))` é um achado soft, já logado.
    pub fn verify(&self, state: &RegistrationState) -> Verdict {
        self.check_simplex(state)?;

        let soft = match self.check_efficiency(state) {
            Some(finding) if self.efficiency == Severity::Hard => return Err(finding),
            Some(finding) => {
                warn!(%finding, "efficiency bound exceeded, continuing");
                Some(finding)
            }
            None => None,
        };

        self.check_complexity(state)?;
        Ok(soft)
    }

    /// Só o que é fatal sob a política atual; não loga nem devolve achados soft
    pub fn enforce(&self, state: &RegistrationState) -> Result<(), Violation> {
        self.check_simplex(state)?;
        if self.efficiency == Severity::Hard {
            if let Some(finding) = self.check_efficiency(state) {
                return Err(finding);
            }
        }
        self.check_complexity(state)
    }

    /// Probabilidades precisam ficar no simplex
    pub fn check_simplex(&self, state: &RegistrationState) -> Result<(), Violation> {
        let sum = state.complexity().probability_sum();
        if (sum - 1.0).abs() <= SIMPLEX_TOLERANCE {
            return Ok(());
        }
        Err(Violation::SimplexBroken { sum })
    }

    /// η contra 2c/(2c+1) + folga; nunca loga
    pub fn check_efficiency(&self, state: &RegistrationState) -> Option<Violation> {
        let eta = state.eta();
        let eta_max = state.eta_max();
        if eta <= eta_max + EFFICIENCY_SLACK {
            return None;
        }
        Some(Violation::EfficiencyExceeded { eta, eta_max })
    }

    /// c_reg precisa ficar abaixo do teto
    pub fn check_complexity(&self, state: &RegistrationState) -> Result<(), Violation> {
        let c_reg = state.c_reg();
        if c_reg <= self.c_reg_max {
            return Ok(());
        }
        Err(Violation::ComplexityBomb {
            c_reg,
            ceiling: self.c_reg_max,
        })
    }
}

impl Default for InvariantVerifier {
    fn default() -> Self {
        Self::from_config(&VmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::Basin;
    use crate::telemetry::Telemetry;

    fn committed() -> RegistrationState {
        let mut state = RegistrationState::new();
        state.commit();
        state
    }

    #[test]
    fn test_nominal_state_passes() {
        let mut state = committed();
        state.observe(&Telemetry::NOMINAL);
        assert_eq!(InvariantVerifier::default().verify(&state), Ok(None));
    }

    #[test]
    fn test_broken_simplex_is_fatal() {
        let mut state = committed();
        state.complexity_mut().basins_mut()[0].probability = 0.5;
        let err = InvariantVerifier::default().verify(&state).unwrap_err();
        assert!(matches!(err, Violation::SimplexBroken { sum } if (sum - 1.25).abs() < 1e-12));
    }

    #[test]
    fn test_simplex_tolerance_edge() {
        let mut state = committed();
        state.complexity_mut().basins_mut()[0].probability += 5e-7;
        assert!(InvariantVerifier::default().check_simplex(&state).is_ok());
        state.complexity_mut().basins_mut()[0].probability += 1e-6;
        assert!(InvariantVerifier::default().check_simplex(&state).is_err());
    }

    #[test]
    fn test_nan_simplex_is_fatal() {
        let mut state = committed();
        state.complexity_mut().basins_mut()[1].probability = f64::NAN;
        assert!(InvariantVerifier::default().check_simplex(&state).is_err());
    }

    #[test]
    fn test_efficiency_soft_vs_hard() {
        // c_reg = 0 dá eta_max = 0; qualquer push excede
        let mut state = RegistrationState::new();
        state.observe(&Telemetry::new(0.01, 0.1, 0.0));

        let soft = InvariantVerifier::new(50000.0, Severity::Soft).verify(&state);
        assert!(matches!(soft, Ok(Some(Violation::EfficiencyExceeded { .. }))));

        let hard = InvariantVerifier::new(50000.0, Severity::Hard).verify(&state);
        assert!(matches!(hard, Err(Violation::EfficiencyExceeded { .. })));
    }

    #[test]
    fn test_complexity_bomb() {
        let mut state = RegistrationState::new();
        state.set_c_reg(50000.5);
        let err = InvariantVerifier::default().verify(&state).unwrap_err();
        assert_eq!(
            err,
            Violation::ComplexityBomb {
                c_reg: 50000.5,
                ceiling: 50000.0
            }
        );

        state.set_c_reg(50000.0);
        assert!(InvariantVerifier::default().check_complexity(&state).is_ok());
    }

    #[test]
    fn test_high_weight_commit_trips_ceiling() {
        let mut state = RegistrationState::new();
        let basins = vec![Basin::new(1.0 / 32.0, 20.0); 32];
        state.complexity_mut().set_distribution(&basins).unwrap();
        // H = 5 bits, w̄ = 20 => 100000
        state.commit();
        assert!(InvariantVerifier::default().verify(&state).is_err());
    }

    #[test]
    fn test_enforce_ignores_soft_efficiency() {
        let mut state = RegistrationState::new();
        state.observe(&Telemetry::new(0.01, 0.1, 0.0));

        assert_eq!(InvariantVerifier::new(50000.0, Severity::Soft).enforce(&state), Ok(()));
        assert!(matches!(
            InvariantVerifier::new(50000.0, Severity::Hard).enforce(&state),
            Err(Violation::EfficiencyExceeded { .. })
        ));

        state.set_c_reg(60000.0);
        assert!(matches!(
            InvariantVerifier::default().enforce(&state),
            Err(Violation::ComplexityBomb { .. })
        ));
    }
}
