//! Histórico circular de capacidade fixa.

use crate::frame::HISTORY_SIZE;

/// Ring buffer de `N` amostras. Ao encher, a amostra mais antiga é
/// sobrescrita; a ordem de iteração é sempre a ordem de chegada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<const N: usize> {
    slots: [u16; N],
    /// Índice da amostra mais antiga.
    head: usize,
    len: usize,
}

/// Histórico usado para stack e heap.
pub type MetricHistory = History<HISTORY_SIZE>;

impl<const N: usize> Default for History<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> History<N> {
    pub const fn new() -> Self {
        Self {
            slots: [0; N],
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adiciona uma amostra, descartando a mais antiga se estiver cheio.
    pub fn push(&mut self, value: u16) {
        if N == 0 {
            return;
        }
        if self.len < N {
            self.slots[(self.head + self.len) % N] = value;
            self.len += 1;
        } else {
            self.slots[self.head] = value;
            self.head = (self.head + 1) % N;
        }
    }

    /// Itera da amostra mais antiga para a mais recente.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u16> + ExactSizeIterator + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % N])
    }

    /// As últimas `n` amostras, em ordem de chegada.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = u16> + '_ {
        self.iter().skip(self.len.saturating_sub(n))
    }

    pub fn to_vec(&self) -> Vec<u16> {
        self.iter().collect()
    }
}
