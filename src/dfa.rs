//! The deterministic half of the automaton engine.
//!
//! DFA states are built on demand: the automaton is only expanded along
//! transition symbols the scanner actually sees. Each DFA state is the
//! sorted set of NFA states it stands for, and that id signature keys a
//! cache so structurally identical subsets always collapse to one node.

use rustc_hash::FxHashMap;

use crate::matcher::ScanSymbol;
use crate::nfa::{Nfa, StateId};
use crate::tokenizer::TokenId;

/// Id of a DFA state, indexing into [`Dfa::states`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DfaId(pub u32);

/// One determinized state: its constituent NFA states in canonical order,
/// the accept tags reachable in their closure (index 0 wins on a match),
/// and the lazily filled transition map.
#[derive(Debug)]
pub struct DfaState {
    pub nfa_states: Vec<StateId>,
    pub accepts: Vec<TokenId>,
    next: FxHashMap<ScanSymbol, DfaId>,
}

impl DfaState {
    /// A dead state stands for no NFA states at all; no input can revive
    /// the scan once it is reached.
    pub fn is_dead(&self) -> bool {
        self.nfa_states.is_empty()
    }
}

/// The determinized automaton: state arena plus the subset cache.
#[derive(Debug, Default)]
pub struct Dfa {
    states: Vec<DfaState>,
    cache: FxHashMap<Box<[StateId]>, DfaId>,
}

impl Dfa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: DfaId) -> &DfaState {
        &self.states[id.0 as usize]
    }

    /// Build the start state from the epsilon-closure of the NFA root.
    pub fn start(&mut self, nfa: &mut Nfa, root: StateId) -> DfaId {
        let mut nfa_states = Vec::new();
        let mut accepts = Vec::new();
        nfa.closure(&mut nfa_states, &mut accepts, root);
        self.intern(nfa_states, accepts)
    }

    /// Take the transition out of `from` on `symbol`, determinizing it on
    /// first use and memoizing it on the state afterwards.
    pub fn advance(&mut self, nfa: &mut Nfa, from: DfaId, symbol: ScanSymbol) -> DfaId {
        if let Some(&next) = self.states[from.0 as usize].next.get(&symbol) {
            return next;
        }
        let next = self.next_state(nfa, from, symbol);
        self.states[from.0 as usize].next.insert(symbol, next);
        next
    }

    fn next_state(&mut self, nfa: &mut Nfa, from: DfaId, symbol: ScanSymbol) -> DfaId {
        let mut nfa_states = Vec::new();
        let mut accepts = Vec::new();

        nfa.begin_pass();

        for i in 0..self.states[from.0 as usize].nfa_states.len() {
            let id = self.states[from.0 as usize].nfa_states[i];
            let Some(matcher) = nfa[id].matcher.clone() else {
                continue;
            };
            if matcher.matches(symbol) {
                if let Some(&successor) = nfa[id].next.first() {
                    nfa.closure(&mut nfa_states, &mut accepts, successor);
                }
            } else if matches!(symbol, ScanSymbol::PreNewline | ScanSymbol::PostNewline) {
                // A zero-width boundary symbol must not kill states that
                // are waiting on a real character; re-admit them as-is.
                nfa.closure(&mut nfa_states, &mut accepts, id);
            }
        }

        nfa_states.sort();
        self.intern(nfa_states, accepts)
    }

    fn intern(&mut self, nfa_states: Vec<StateId>, accepts: Vec<TokenId>) -> DfaId {
        if let Some(&id) = self.cache.get(nfa_states.as_slice()) {
            return id;
        }
        let id = DfaId(self.states.len() as u32);
        self.cache.insert(nfa_states.clone().into_boxed_slice(), id);
        self.states.push(DfaState {
            nfa_states,
            accepts,
            next: FxHashMap::default(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_subsets_collapse_to_one_state() {
        let mut nfa = Nfa::new();
        let fragment = nfa.compile("ab|ac").unwrap();
        nfa.accept(fragment, TokenId::Terminal("t".into()));

        let root = nfa.state(None);
        nfa[root].next.push(fragment.start);

        let mut dfa = Dfa::new();
        nfa.begin_pass();
        let start = dfa.start(&mut nfa, root);
        let after_a = dfa.advance(&mut nfa, start, ScanSymbol::Char('a'));
        let again = dfa.advance(&mut nfa, start, ScanSymbol::Char('a'));
        assert_eq!(after_a, again);

        // Both branches end in the shared alternation tail, so their
        // subsets are identical and the cache collapses them.
        let b = dfa.advance(&mut nfa, after_a, ScanSymbol::Char('b'));
        let c = dfa.advance(&mut nfa, after_a, ScanSymbol::Char('c'));
        assert_eq!(b, c);
        assert_eq!(dfa.state(b).accepts.len(), 1);
    }

    #[test]
    fn dead_state_on_unmatched_input() {
        let mut nfa = Nfa::new();
        let fragment = nfa.compile("x").unwrap();
        nfa.accept(fragment, TokenId::Terminal("x".into()));
        let root = nfa.state(None);
        nfa[root].next.push(fragment.start);

        let mut dfa = Dfa::new();
        nfa.begin_pass();
        let start = dfa.start(&mut nfa, root);
        let dead = dfa.advance(&mut nfa, start, ScanSymbol::Char('y'));
        assert!(dfa.state(dead).is_dead());
    }
}
