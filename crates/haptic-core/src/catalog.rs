//! Waveform catalog.
//!
//! An ordered, immutable list of named feedback patterns. Each pattern's
//! 0-based position in declaration order is its wire index — the compact
//! identifier used by the binary WebSocket trigger channel. The index↔name
//! mapping is fixed for the process lifetime; reordering entries is a
//! protocol-breaking change.

use serde::Serialize;

/// One named feedback pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Waveform {
    pub name: &'static str,
    pub description: &'static str,
}

/// Ordered, immutable set of waveforms known to the gateway.
#[derive(Debug, Clone)]
pub struct WaveformCatalog {
    entries: Vec<Waveform>,
}

impl WaveformCatalog {
    /// The standard catalog shipped with the gateway.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                Waveform { name: "sharp_state_change", description: "Short, high-intensity pulse for discrete state transitions" },
                Waveform { name: "damp_state_change", description: "Gradual intensity change for smooth state transitions" },
                Waveform { name: "sharp_collision", description: "High-intensity impact simulation for collision events" },
                Waveform { name: "damp_collision", description: "Medium-intensity impact with gradual decay" },
                Waveform { name: "subtle_collision", description: "Low-intensity feedback for light contact events" },
                Waveform { name: "happy_alert", description: "Positive feedback pattern for success states" },
                Waveform { name: "angry_alert", description: "Attention-grabbing pattern for error conditions" },
                Waveform { name: "completed", description: "Confirmation pattern for task completion" },
                Waveform { name: "square", description: "Sharp-edged waveform with defined start/stop points" },
                Waveform { name: "wave", description: "Smooth sinusoidal pattern with gradual transitions" },
                Waveform { name: "firework", description: "Multi-burst pattern with varying intensities" },
                Waveform { name: "mad", description: "High-frequency chaotic pattern" },
                Waveform { name: "knock", description: "Repetitive impact pattern" },
                Waveform { name: "jingle", description: "Musical-style pattern with multiple tones" },
                Waveform { name: "ringing", description: "Continuous oscillating pattern" },
                Waveform { name: "heartbeat", description: "Rhythmic double-pulse pattern" },
            ],
        }
    }

    /// Number of patterns in the catalog.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in wire-index order.
    pub fn entries(&self) -> &[Waveform] {
        &self.entries
    }

    /// Looks up a pattern by wire index.
    pub fn by_index(&self, index: usize) -> Option<&Waveform> {
        self.entries.get(index)
    }

    /// Looks up a pattern by name, returning it with its wire index.
    pub fn by_name(&self, name: &str) -> Option<(usize, &Waveform)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, w)| w.name == name)
    }

    /// True when `name` is a known pattern.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// All pattern names in wire-index order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|w| w.name.to_string()).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
