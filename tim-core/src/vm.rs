//! Máquina virtual TIM
//!
//! Fetch-decode-execute sobre uma pilha de operandos limitada, oito
//! registradores e uma memória linear fixa com a imagem do programa. Cada
//! step também alimenta o subsistema de registro e o verificador:
//!
//! ```text
//!   fetch memory[pc] ─► decode operands ─► execute
//!                                            │
//!   verify ◄── τ += 1 − η ◄── observe ◄── telemetry
//!     │
//!     └─ fatal ─► HaltedViolation
//! ```
//!
//! Uma falha em fetch, decode ou execute para a máquina na hora; esse step
//! não registra telemetria nem avança τ.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::bounded::BoundedStack;
use crate::config::{ExecutionMode, VmConfig};
use crate::error::{LoadError, Violation};
use crate::image::ProgramImage;
use crate::instruction::Instruction;
use crate::invariant::InvariantVerifier;
use crate::memory::LinearMemory;
use crate::opcode::Opcode;
use crate::operand::{DecodeFault, Operand, TAG_CHAR, TAG_FLOAT, TAG_INT, TAG_STRING};
use crate::program::{NUM_REGISTERS, Program, StringPool};
use crate::registration::RegistrationState;
use crate::telemetry::Telemetry;

/// Valor em runtime na pilha e nos registradores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Char(char),
    /// Índice no string pool
    Str(u32),
}

impl Value {
    pub fn as_int(&self) -> i64 {
        match *self {
            Self::Int(v) => v,
            Self::Float(v) => v as i64,
            Self::Char(c) => c as i64,
            Self::Str(i) => i as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
            Self::Char(c) => c as u32 as f64,
            Self::Str(i) => i as f64,
        }
    }

    /// Teste de condição de `zjmp` / `nzjmp`
    pub fn is_zero(&self) -> bool {
        match *self {
            Self::Int(v) => v == 0,
            Self::Float(v) => v == 0.0,
            Self::Char(c) => c == '\0',
            Self::Str(_) => false,
        }
    }

    /// Tag de operando do literal correspondente
    pub fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => TAG_INT,
            Self::Float(_) => TAG_FLOAT,
            Self::Char(_) => TAG_CHAR,
            Self::Str(_) => TAG_STRING,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Char(c) => write!(f, "{:?}", c),
            Self::Str(i) => write!(f, "${}", i),
        }
    }
}

/// Estado da máquina
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    Running,
    /// `halt` executado
    HaltedNominal,
    /// Uma violação fatal foi registrada
    HaltedViolation,
}

impl MachineState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Resumo de uma execução limitada
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub state: MachineState,
    /// Steps desta execução
    pub cycles: u64,
    /// Parou por falta de budget, não por halt
    pub budget_exhausted: bool,
    pub pc: usize,
    pub sp: usize,
    pub top: Option<Value>,
    pub eta: f64,
    pub c_reg: f64,
    pub tau: f64,
    /// Achados soft de eficiência até aqui
    pub soft_findings: u64,
    pub violation: Option<Violation>,
    pub output: String,
}

/// Trusted Invariant Machine
#[derive(Debug, Clone)]
pub struct TimVm {
    config: VmConfig,
    registers: [Value; NUM_REGISTERS],
    pc: usize,
    stack: BoundedStack<Value>,
    memory: LinearMemory,
    strings: StringPool,
    state: MachineState,
    violation: Option<Violation>,
    registration: RegistrationState,
    verifier: InvariantVerifier,
    telemetry: Telemetry,
    output: String,
    cycles: u64,
    soft_findings: u64,
    /// Registro foi emprestado mutável; reverificar antes do próximo fetch
    recheck: bool,
}

impl TimVm {
    /// Carrega `program` numa máquina nova
    pub fn new(program: &Program, config: VmConfig) -> Result<Self, LoadError> {
        let image = ProgramImage::lower(program);
        let mut memory = LinearMemory::new(config.memory_size);
        memory.load(&image)?;

        debug!(
            image_bytes = image.len(),
            entry = image.entry(),
            mode = ?config.execution_mode,
            "program loaded"
        );

        Ok(Self {
            registers: [Value::default(); NUM_REGISTERS],
            pc: image.entry(),
            stack: BoundedStack::new("stack", config.stack_capacity),
            memory,
            strings: program.strings().clone(),
            state: MachineState::Running,
            violation: None,
            registration: RegistrationState::new(),
            verifier: InvariantVerifier::from_config(&config),
            telemetry: Telemetry::default(),
            output: String::new(),
            cycles: 0,
            soft_findings: 0,
            recheck: false,
            config,
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Execução passo a passo
    // ═══════════════════════════════════════════════════════════════

    /// Executa uma instrução. Máquina parada não é tocada.
    pub fn step(&mut self) -> MachineState {
        if !self.state.is_running() {
            return self.state;
        }

        if std::mem::take(&mut self.recheck) {
            if let Err(violation) = self.verifier.verify(&self.registration) {
                return self.fail(violation);
            }
        }

        self.cycles += 1;
        let at = self.pc;

        // Fetch
        if at >= self.memory.size() {
            return self.fail(Violation::PcOutOfBounds { pc: at });
        }
        let byte = match self.memory.read(at) {
            Ok(byte) => byte,
            Err(violation) => return self.fail(violation),
        };
        let opcode = Opcode::from_byte(byte);

        // Decode
        let instr = match opcode {
            Some(op) => {
                let mut reader = self.memory.reader_at(at + 1);
                match Instruction::decode_operands(op, &mut reader) {
                    Ok(instr) => {
                        self.pc = reader.position();
                        Some(instr)
                    }
                    Err(fault) => return self.fail(decode_violation(fault)),
                }
            }
            None => {
                trace!(byte, pc = at, "unknown opcode, treated as nop");
                self.pc = at + 1;
                None
            }
        };

        // Execute
        if let Some(instr) = instr {
            if let Err(violation) = self.execute(instr, at) {
                return self.fail(violation);
            }
        }

        // Registro
        self.telemetry = Telemetry::for_opcode(opcode);
        self.registration.observe(&self.telemetry);
        self.registration.advance_tau();

        trace!(
            cycle = self.cycles,
            pc = at,
            op = opcode.map_or("?", |op| op.mnemonic()),
            sp = self.stack.len(),
            eta = self.registration.eta(),
            tau = self.registration.tau(),
            "step"
        );

        match self.verifier.verify(&self.registration) {
            Ok(Some(_)) => self.soft_findings += 1,
            Ok(None) => {}
            Err(violation) => return self.fail(violation),
        }

        self.state
    }

    /// Executa até parar ou até `budget` steps
    pub fn run(&mut self, budget: u64) -> RunReport {
        self.run_with(budget, |_, _| {})
    }

    /// Como [`run`](Self::run), chamando `observer` após cada step com o
    /// índice de ciclo (a partir de 0) desta execução
    pub fn run_with<F>(&mut self, budget: u64, mut observer: F) -> RunReport
    where
        F: FnMut(&TimVm, u64),
    {
        let mut cycles = 0;
        while self.state.is_running() && cycles < budget {
            self.step();
            observer(self, cycles);
            cycles += 1;
        }
        self.report(cycles)
    }

    fn report(&self, cycles: u64) -> RunReport {
        RunReport {
            state: self.state,
            cycles,
            budget_exhausted: self.state.is_running(),
            pc: self.pc,
            sp: self.stack.len(),
            top: self.top(),
            eta: self.registration.eta(),
            c_reg: self.registration.c_reg(),
            tau: self.registration.tau(),
            soft_findings: self.soft_findings,
            violation: self.violation.clone(),
            output: self.output.clone(),
        }
    }

    fn fail(&mut self, violation: Violation) -> MachineState {
        error!(
            %violation,
            class = ?violation.class(),
            pc = self.pc,
            sp = self.stack.len(),
            "machine halted on violation"
        );
        self.violation = Some(violation);
        self.state = MachineState::HaltedViolation;
        self.state
    }

    // ═══════════════════════════════════════════════════════════════
    // Execução
    // ═══════════════════════════════════════════════════════════════

    fn execute(&mut self, instr: Instruction, at: usize) -> Result<(), Violation> {
        use Opcode::*;

        let op = instr.opcode;
        if !self.require(op.stack_inputs(), op)? {
            return Ok(());
        }

        match op {
            // ─────────────────────────────────────────────────────────
            // Controle
            // ─────────────────────────────────────────────────────────
            Halt => {
                self.state = MachineState::HaltedNominal;
            }

            Nop => {}

            // ─────────────────────────────────────────────────────────
            // Pilha
            // ─────────────────────────────────────────────────────────
            Push => {
                let value = self.operand_value(instr.operand, at)?;
                self.push(value)?;
            }

            Pop => {
                self.pop();
            }

            Dup => {
                let value = self.pop();
                self.push(value)?;
                self.push(value)?;
            }

            Swap => {
                self.stack.swap_with_top(1);
            }

            Indup => {
                let depth = self.depth_operand(instr.operand, at)?;
                let Some(&value) = self.stack.peek_at(depth) else {
                    return self.underflow(depth.saturating_add(1), op);
                };
                self.push(value)?;
            }

            Inswap => {
                let depth = self.depth_operand(instr.operand, at)?;
                if !self.stack.swap_with_top(depth) {
                    return self.underflow(depth.saturating_add(1), op);
                }
            }

            Mov => {
                let index = instr.register.unwrap_or(u8::MAX);
                if index as usize >= NUM_REGISTERS {
                    return Err(Violation::RegisterOutOfBounds { index });
                }
                let value = match instr.operand {
                    Operand::Top => match self.stack.pop() {
                        Some(value) => value,
                        None => return self.underflow(1, op),
                    },
                    operand => self.operand_value(operand, at)?,
                };
                self.registers[index as usize] = value;
            }

            PushStr | GetStr => {
                let index = match instr.operand {
                    Operand::StringIndex(i) => i,
                    operand => {
                        let raw = self.operand_value(operand, at)?.as_int();
                        u32::try_from(raw).unwrap_or(u32::MAX)
                    }
                };
                if self.strings.get(index).is_none() {
                    return Err(Violation::StringOutOfBounds { index });
                }
                self.push(Value::Str(index))?;
            }

            // ─────────────────────────────────────────────────────────
            // Aritmética inteira
            // ─────────────────────────────────────────────────────────
            Add | Sub | Mul | Div | Mod | And | Or => {
                let b = self.pop().as_int();
                let a = self.pop().as_int();
                let result = match op {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    Mul => a.wrapping_mul(b),
                    Div | Mod if b == 0 => return Err(Violation::DivisionByZero),
                    Div => a.wrapping_div(b),
                    Mod => a.wrapping_rem(b),
                    And => a & b,
                    _ => a | b,
                };
                self.push(Value::Int(result))?;
            }

            // ─────────────────────────────────────────────────────────
            // Aritmética float
            // ─────────────────────────────────────────────────────────
            AddF | SubF | MulF | DivF | ModF => {
                let b = self.pop().as_float();
                let a = self.pop().as_float();
                let result = match op {
                    AddF => a + b,
                    SubF => a - b,
                    MulF => a * b,
                    DivF => a / b,
                    _ => a % b,
                };
                self.push(Value::Float(result))?;
            }

            // ─────────────────────────────────────────────────────────
            // Comparação
            // ─────────────────────────────────────────────────────────
            Cmpe | Cmpne | Cmpg | Cmpl | Cmpge | Cmple => {
                let b = self.pop();
                let a = self.pop();
                let ordering = match (a, b) {
                    (Value::Float(_), _) | (_, Value::Float(_)) => {
                        a.as_float().partial_cmp(&b.as_float())
                    }
                    _ => Some(a.as_int().cmp(&b.as_int())),
                };
                let holds = match ordering {
                    Some(ord) => match op {
                        Cmpe => ord.is_eq(),
                        Cmpne => ord.is_ne(),
                        Cmpg => ord.is_gt(),
                        Cmpl => ord.is_lt(),
                        Cmpge => ord.is_ge(),
                        _ => ord.is_le(),
                    },
                    // NaN é diferente de tudo
                    None => op == Cmpne,
                };
                self.push(Value::Int(holds as i64))?;
            }

            // ─────────────────────────────────────────────────────────
            // Conversão
            // ─────────────────────────────────────────────────────────
            Itof => {
                let v = self.pop().as_float();
                self.push(Value::Float(v))?;
            }

            Ftoi => {
                let v = self.pop().as_float() as i64;
                self.push(Value::Int(v))?;
            }

            Itoc => {
                let v = self.pop().as_int();
                let c = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                self.push(Value::Char(c))?;
            }

            // ─────────────────────────────────────────────────────────
            // Memória
            // ─────────────────────────────────────────────────────────
            Load => {
                let addr = address(self.pop());
                let byte = self.memory.read(addr)?;
                self.push(Value::Int(byte as i64))?;
            }

            Store => {
                let addr = address(self.pop());
                let value = self.pop();
                self.memory.write(addr, value.as_int() as u8)?;
            }

            // ─────────────────────────────────────────────────────────
            // Desvio
            // ─────────────────────────────────────────────────────────
            Jmp => {
                self.pc = target(instr.operand);
            }

            Zjmp | Nzjmp => {
                let condition = self.pop();
                if condition.is_zero() == (op == Zjmp) {
                    self.pc = target(instr.operand);
                }
            }

            Call => {
                self.push(Value::Int(self.pc as i64))?;
                self.pc = target(instr.operand);
            }

            Ret => {
                self.pc = address(self.pop());
            }

            // ─────────────────────────────────────────────────────────
            // Sistema
            // ─────────────────────────────────────────────────────────
            Native => {
                let id = match instr.operand {
                    Operand::Int(id) => id,
                    _ => -1,
                };
                return Err(Violation::NativeCallUnsupported { id });
            }

            Strlen => {
                let value = self.pop();
                let text = self.string_of(value, at)?;
                let len = text.chars().count() as i64;
                self.push(Value::Int(len))?;
            }

            Print => {
                let value = self.pop();
                let rendered = match value {
                    Value::Int(v) => v.to_string(),
                    Value::Float(v) => v.to_string(),
                    Value::Char(c) => c.to_string(),
                    Value::Str(_) => self.string_of(value, at)?.to_owned(),
                };
                debug!(%rendered, "print");
                self.output.push_str(&rendered);
            }

            // ─────────────────────────────────────────────────────────
            // Registro
            // ─────────────────────────────────────────────────────────
            RegCommit => {
                self.registration.commit();
            }

            // Achados soft ficam para a verificação do fim do step
            RegCheck => {
                self.verifier.enforce(&self.registration)?;
            }

            Mirror => {
                debug!(
                    pc = at,
                    sp = self.stack.len(),
                    eta = self.registration.eta(),
                    c_reg = self.registration.c_reg(),
                    tau = self.registration.tau(),
                    basins = self.registration.complexity().len(),
                    "mirror stage: self-check"
                );
            }
        }

        Ok(())
    }

    /// Se há `needed` entradas na pilha. Lenient pula a instrução
    /// (`Ok(false)`); strict falha.
    fn require(&self, needed: usize, op: Opcode) -> Result<bool, Violation> {
        if self.stack.len() >= needed {
            return Ok(true);
        }
        self.underflow(needed, op).map(|_| false)
    }

    fn underflow(&self, required: usize, op: Opcode) -> Result<(), Violation> {
        let available = self.stack.len();
        match self.config.execution_mode {
            ExecutionMode::Strict => Err(Violation::StackUnderflow {
                required,
                available,
            }),
            ExecutionMode::Lenient => {
                trace!(op = op.mnemonic(), required, available, "stack underflow ignored");
                Ok(())
            }
        }
    }

    fn push(&mut self, value: Value) -> Result<(), Violation> {
        self.stack
            .push(value)
            .map_err(|e| Violation::StackOverflow { capacity: e.capacity })
    }

    /// Pop depois de `require` ter checado a profundidade
    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    fn operand_value(&self, operand: Operand, at: usize) -> Result<Value, Violation> {
        Ok(match operand {
            Operand::Int(v) => Value::Int(v),
            Operand::Float(v) => Value::Float(v),
            Operand::Char(c) => Value::Char(c),
            Operand::StringIndex(i) => Value::Str(i),
            Operand::Register(index) => *self
                .registers
                .get(index as usize)
                .ok_or(Violation::RegisterOutOfBounds { index })?,
            Operand::None | Operand::Top => {
                return Err(Violation::InvalidOperand {
                    tag: operand.tag(),
                    addr: at,
                });
            }
        })
    }

    fn depth_operand(&self, operand: Operand, at: usize) -> Result<usize, Violation> {
        let depth = self.operand_value(operand, at)?.as_int();
        Ok(usize::try_from(depth).unwrap_or(usize::MAX))
    }

    fn string_of(&self, value: Value, at: usize) -> Result<&str, Violation> {
        match value {
            Value::Str(index) => self
                .strings
                .get(index)
                .ok_or(Violation::StringOutOfBounds { index }),
            other => Err(Violation::InvalidOperand {
                tag: other.tag(),
                addr: at,
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Inspeção
    // ═══════════════════════════════════════════════════════════════

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn running(&self) -> bool {
        self.state.is_running()
    }

    pub fn violation_flag(&self) -> bool {
        self.violation.is_some()
    }

    /// A violação registrada, se houver
    pub fn violation(&self) -> Option<&Violation> {
        self.violation.as_ref()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Stack pointer (número de entradas)
    pub fn sp(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> Option<Value> {
        self.stack.peek().copied()
    }

    /// Conteúdo da pilha, da base ao topo
    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    pub fn registers(&self) -> &[Value; NUM_REGISTERS] {
        &self.registers
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// Tudo que `print` escreveu
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn registration(&self) -> &RegistrationState {
        &self.registration
    }

    /// Estado de registro mutável. Os invariantes são reverificados antes
    /// do próximo fetch.
    pub fn registration_mut(&mut self) -> &mut RegistrationState {
        self.recheck = true;
        &mut self.registration
    }

    /// Telemetria da última instrução executada
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// Steps desde a criação
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn soft_findings(&self) -> u64 {
        self.soft_findings
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }
}

fn decode_violation(fault: DecodeFault) -> Violation {
    match fault {
        DecodeFault::Truncated { at } => Violation::PcOutOfBounds { pc: at },
        DecodeFault::InvalidTag { tag, at } => Violation::InvalidOperand { tag, addr: at },
    }
}

/// Destino de salto; o que não cabe cai fora da memória e trapa
fn target(operand: Operand) -> usize {
    match operand {
        Operand::Int(t) => usize::try_from(t).unwrap_or(usize::MAX),
        _ => usize::MAX,
    }
}

fn address(value: Value) -> usize {
    usize::try_from(value.as_int()).unwrap_or(usize::MAX)
}
