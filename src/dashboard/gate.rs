/// Whether the connected network is the one the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkGate {
    required_chain_id: u64,
    active_chain_id: Option<u64>,
}

impl NetworkGate {
    pub fn new(required_chain_id: u64) -> Self {
        Self {
            required_chain_id,
            active_chain_id: None,
        }
    }

    /// Records the active chain id. Returns true when the gate flipped.
    pub fn observe(&mut self, chain_id: u64) -> bool {
        if self.active_chain_id == Some(chain_id) {
            return false;
        }

        let was_open = self.is_open();
        self.active_chain_id = Some(chain_id);
        was_open != self.is_open()
    }

    pub fn is_open(&self) -> bool {
        self.active_chain_id == Some(self.required_chain_id)
    }

    pub fn active_chain_id(&self) -> Option<u64> {
        self.active_chain_id
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_until_chain_known() {
        let gate = NetworkGate::new(10);
        assert!(!gate.is_open());
        assert_eq!(gate.active_chain_id(), None);
    }

    #[test]
    fn test_opens_on_required_chain() {
        let mut gate = NetworkGate::new(10);
        assert!(gate.observe(10));
        assert!(gate.is_open());

        // same id again is not a change
        assert!(!gate.observe(10));
        assert!(gate.is_open());
    }

    #[test]
    fn test_other_chain_keeps_gate_closed() {
        let mut gate = NetworkGate::new(10);
        assert!(!gate.observe(1));
        assert!(!gate.is_open());
        assert_eq!(gate.active_chain_id(), Some(1));
    }

    #[test]
    fn test_closes_when_switching_away() {
        let mut gate = NetworkGate::new(10);
        gate.observe(10);
        assert!(gate.observe(1));
        assert!(!gate.is_open());
        assert!(gate.observe(10));
    }
}
