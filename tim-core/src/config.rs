//! Configuração da máquina
//!
//! [`VmConfig`] agrupa os limites de uma máquina e as duas políticas: o que
//! um stack underflow faz ([`ExecutionMode`]) e o que um limite de eficiência
//! excedido faz ([`Severity`]). Valores vêm do código, de serde ou do
//! ambiente (`.env` é carregado uma vez no primeiro acesso).

use std::env;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::memory::MEMORY_SIZE;

/// Capacidade padrão da pilha de operandos
pub const MAX_STACK: usize = 1024;

/// Teto padrão de complexidade
pub const C_REG_MAX: f64 = 50000.0;

/// Budget padrão de ciclos do host
pub const DEFAULT_CYCLE_BUDGET: u64 = 100;

// Carrega .env automaticamente na primeira leitura da config
static DOTENV_INIT: Lazy<()> = Lazy::new(|| {
    let _ = dotenv::dotenv();
});

#[inline]
fn ensure_loaded() {
    let _ = &*DOTENV_INIT;
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    ensure_loaded();
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Política de stack underflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Instruções em underflow são puladas; o pc ainda avança
    #[default]
    Lenient,
    /// Underflow é violação fatal
    Strict,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

/// Política do limite de eficiência
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Registrado como warning; a execução continua
    #[default]
    Soft,
    /// Fatal, como as checagens de simplex e complexidade
    Hard,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Configuração de uma máquina
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Capacidade da pilha de operandos (entradas)
    pub stack_capacity: usize,
    /// Tamanho da memória linear (bytes)
    pub memory_size: usize,
    /// Teto de complexidade imposto pelo verificador
    pub c_reg_max: f64,
    pub execution_mode: ExecutionMode,
    pub efficiency_severity: Severity,
    /// Steps que o host roda antes de desistir
    pub cycle_budget: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: MAX_STACK,
            memory_size: MEMORY_SIZE,
            c_reg_max: C_REG_MAX,
            execution_mode: ExecutionMode::Lenient,
            efficiency_severity: Severity::Soft,
            cycle_budget: DEFAULT_CYCLE_BUDGET,
        }
    }
}

impl VmConfig {
    /// Comportamento de referência: underflow leniente, eficiência soft
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Todo achado é fatal
    pub fn strict() -> Self {
        Self::default()
            .with_execution_mode(ExecutionMode::Strict)
            .with_efficiency_severity(Severity::Hard)
    }

    /// Defaults sobrescritos por variáveis `TIM_*` (e `.env`).
    /// Valores que não parseiam caem no default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            stack_capacity: env_or("TIM_STACK_CAPACITY", d.stack_capacity),
            memory_size: env_or("TIM_MEMORY_SIZE", d.memory_size),
            c_reg_max: env_or("TIM_C_REG_MAX", d.c_reg_max),
            execution_mode: env_or("TIM_EXECUTION_MODE", d.execution_mode),
            efficiency_severity: env_or("TIM_EFFICIENCY_SEVERITY", d.efficiency_severity),
            cycle_budget: env_or("TIM_CYCLE_BUDGET", d.cycle_budget),
        }
    }

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    pub fn with_c_reg_max(mut self, ceiling: f64) -> Self {
        self.c_reg_max = ceiling;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_efficiency_severity(mut self, severity: Severity) -> Self {
        self.efficiency_severity = severity;
        self
    }

    pub fn with_cycle_budget(mut self, budget: u64) -> Self {
        self.cycle_budget = budget;
        self
    }
}
