//! Subsistema de registro / estimador
//!
//! Transforma a [`Telemetry`] de cada step na eficiência de registro `η`,
//! mantém o acumulador de tempo próprio `τ` e, no `reg_commit`, deriva o
//! escalar de complexidade `c_reg` da distribuição de basins.
//!
//! ```text
//! η     = clamp(α0 + α1·gate + α2·mem + α3·branch, 0, 0.99)
//! τ    += 1 − η
//! c_reg = H(p) · w̄ · k        H(p) = −Σ pᵢ·log2 pᵢ,  w̄ = Σ pᵢ·wᵢ
//! ```
//!
//! `η` depende só da tripla de telemetria atual, nunca do histórico.

use tracing::{debug, trace};

use crate::bounded::BoundedStack;
use crate::error::CapacityExceeded;
use crate::telemetry::Telemetry;

/// Vetor de calibração. α4 pesa um canal térmico que a VM nunca alimenta.
pub const ALPHA: [f64; 5] = [0.1, 0.35, 0.15, 0.40, 0.001];

/// Clamp superior de `η`
pub const ETA_CEILING: f64 = 0.99;

/// Escala `k` aplicada pelo `reg_commit`
pub const COMPLEXITY_SCALE: f64 = 1000.0;

/// Número máximo de basins
pub const MAX_BASINS: usize = 64;

/// Basins na distribuição inicial
pub const INITIAL_BASINS: usize = 4;

/// Um modo discreto do simplex de ocupação
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basin {
    pub probability: f64,
    pub weight: f64,
}

impl Basin {
    pub const fn new(probability: f64, weight: f64) -> Self {
        Self { probability, weight }
    }
}

/// Distribuição de basins ponderada por probabilidade
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityVector {
    basins: BoundedStack<Basin>,
}

impl ComplexityVector {
    /// Vetor vazio (quebra o simplex até que basins sejam adicionados)
    pub fn empty() -> Self {
        Self {
            basins: BoundedStack::new("basin vector", MAX_BASINS),
        }
    }

    /// `n` basins equiprováveis com pesos 1.0, 1.1, 1.2, ...
    pub fn uniform(n: usize) -> Result<Self, CapacityExceeded> {
        let mut cv = Self::empty();
        let p = 1.0 / n as f64;
        for i in 0..n {
            cv.push_basin(Basin::new(p, 1.0 + 0.1 * i as f64))?;
        }
        Ok(cv)
    }

    /// Adiciona um basin; probabilidades não são renormalizadas
    pub fn push_basin(&mut self, basin: Basin) -> Result<(), CapacityExceeded> {
        self.basins.push(basin)
    }

    /// Substitui a distribuição inteira. Somas não são checadas aqui; o
    /// verificador pega um simplex quebrado no próximo step.
    pub fn set_distribution(&mut self, basins: &[Basin]) -> Result<(), CapacityExceeded> {
        if basins.len() > MAX_BASINS {
            return Err(CapacityExceeded::new("basin vector", MAX_BASINS));
        }
        self.basins.clear();
        for &basin in basins {
            self.basins.push(basin)?;
        }
        Ok(())
    }

    /// Quantidade de basins ativos
    pub fn len(&self) -> usize {
        self.basins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basins.is_empty()
    }

    pub fn basins(&self) -> &[Basin] {
        self.basins.as_slice()
    }

    pub fn basins_mut(&mut self) -> &mut [Basin] {
        self.basins.as_mut_slice()
    }

    /// Σ pᵢ sobre os basins ativos
    pub fn probability_sum(&self) -> f64 {
        self.basins().iter().map(|b| b.probability).sum()
    }

    /// Entropia de Shannon em bits; basins com p ≤ 0 não contribuem
    pub fn entropy_bits(&self) -> f64 {
        self.basins()
            .iter()
            .filter(|b| b.probability > 0.0)
            .map(|b| -b.probability * b.probability.log2())
            .sum()
    }

    /// Peso médio ponderado w̄
    pub fn mean_weight(&self) -> f64 {
        self.basins().iter().map(|b| b.probability * b.weight).sum()
    }
}

impl Default for ComplexityVector {
    fn default() -> Self {
        Self::uniform(INITIAL_BASINS).unwrap_or_else(|_| Self::empty())
    }
}

/// Eficiência de registro para uma tripla de telemetria, limitada a
/// `[0, ETA_CEILING]`. Entrada não finita vira 0.
pub fn estimate_eta(t: &Telemetry) -> f64 {
    let eta = ALPHA[0] + ALPHA[1] * t.gate + ALPHA[2] * t.memory + ALPHA[3] * t.branch;
    if eta.is_nan() {
        return 0.0;
    }
    eta.clamp(0.0, ETA_CEILING)
}

/// Teto teórico de eficiência para um escalar de complexidade: 2c / (2c + 1)
pub fn eta_max(c_reg: f64) -> f64 {
    (2.0 * c_reg) / (2.0 * c_reg + 1.0)
}

/// Eficiência, complexidade e tempo próprio de uma máquina
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationState {
    eta: f64,
    c_reg: f64,
    tau: f64,
    complexity: ComplexityVector,
}

impl RegistrationState {
    pub fn new() -> Self {
        Self {
            eta: 0.0,
            c_reg: 0.0,
            tau: 0.0,
            complexity: ComplexityVector::default(),
        }
    }

    /// Eficiência de registro η
    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Escalar de complexidade c_reg
    pub fn c_reg(&self) -> f64 {
        self.c_reg
    }

    /// Tempo próprio τ
    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn complexity(&self) -> &ComplexityVector {
        &self.complexity
    }

    pub fn complexity_mut(&mut self) -> &mut ComplexityVector {
        &mut self.complexity
    }

    /// Teto para o c_reg atual
    pub fn eta_max(&self) -> f64 {
        eta_max(self.c_reg)
    }

    /// Alimenta uma tripla de telemetria e retorna o novo η
    pub fn observe(&mut self, telemetry: &Telemetry) -> f64 {
        self.eta = estimate_eta(telemetry);
        trace!(eta = self.eta, ?telemetry, "registration observe");
        self.eta
    }

    /// τ += 1 − η
    pub fn advance_tau(&mut self) -> f64 {
        self.tau += 1.0 - self.eta;
        self.tau
    }

    /// Recalcula c_reg = H(p) · w̄ · k a partir da distribuição de basins
    pub fn commit(&mut self) -> f64 {
        let entropy = self.complexity.entropy_bits();
        let w_bar = self.complexity.mean_weight();
        self.c_reg = entropy * w_bar * COMPLEXITY_SCALE;
        debug!(c_reg = self.c_reg, entropy, w_bar, "reg_commit");
        self.c_reg
    }

    /// Sobrescreve c_reg sem commit
    pub fn set_c_reg(&mut self, c_reg: f64) {
        self.c_reg = c_reg;
    }
}

impl Default for RegistrationState {
    fn default() -> Self {
        Self::new()
    }
}
