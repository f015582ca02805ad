//! Containers com capacidade verificada
//!
//! Toda região de tamanho fixo da máquina (pilha de operandos, arrays de
//! basins, string pool) cresce por aqui e reporta [`CapacityExceeded`] em
//! vez de escrever além do limite.

use crate::error::CapacityExceeded;

/// Pilha LIFO com capacidade rígida
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedStack<T> {
    items: Vec<T>,
    capacity: usize,
    name: &'static str,
}

impl<T> BoundedStack<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(4096)),
            capacity,
            name,
        }
    }

    pub fn push(&mut self, value: T) -> Result<(), CapacityExceeded> {
        if self.items.len() >= self.capacity {
            return Err(CapacityExceeded::new(self.name, self.capacity));
        }
        self.items.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Entrada `depth` posições abaixo do topo (0 = topo)
    pub fn peek_at(&self, depth: usize) -> Option<&T> {
        let len = self.items.len();
        if depth >= len {
            return None;
        }
        self.items.get(len - 1 - depth)
    }

    /// Troca o topo com a entrada `depth` posições abaixo
    pub fn swap_with_top(&mut self, depth: usize) -> bool {
        let len = self.items.len();
        if depth >= len {
            return false;
        }
        self.items.swap(len - 1, len - 1 - depth);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Vista da base ao topo
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Vista mutável; o tamanho fica fixo, então o limite não é cruzado
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}
