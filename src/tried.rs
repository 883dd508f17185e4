//! Peer-count-sized bitset, shaped after `ngx_http_upstream_rr_peer_data_t`'s
//! `uintptr_t *tried` bitmap over upstream peer indices. Not wired into a
//! load balancer — the round-robin selection algorithm itself is out of
//! scope — but correctly shaped for one to use.

pub struct TriedSet {
    bits: Vec<u64>,
}

const WORD_BITS: usize = u64::BITS as usize;

impl TriedSet {
    pub fn new(peer_count: usize) -> Self {
        let words = (peer_count + WORD_BITS - 1) / WORD_BITS.max(1);
        TriedSet { bits: vec![0u64; words.max(1)] }
    }

    pub fn set(&mut self, peer: usize) {
        self.bits[peer / WORD_BITS] |= 1u64 << (peer % WORD_BITS);
    }

    pub fn is_set(&self, peer: usize) -> bool {
        self.bits[peer / WORD_BITS] & (1u64 << (peer % WORD_BITS)) != 0
    }

    pub fn clear(&mut self, peer: usize) {
        self.bits[peer / WORD_BITS] &= !(1u64 << (peer % WORD_BITS));
    }

    pub fn clear_all(&mut self) {
        for w in &mut self.bits {
            *w = 0;
        }
    }

    pub fn all_tried(&self, peer_count: usize) -> bool {
        (0..peer_count).all(|p| self.is_set(p))
    }
}
