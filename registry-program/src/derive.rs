#![forbid(unsafe_code)]

//! Registry account addresses. Every account the program touches lives at
//! one of these derivations; nothing else is accepted.

use registry_core::codec::u16_seed;
use registry_core::{find_derived_address, Address, DeriveError, DerivedAddress};

pub const SUBNET_NAMESPACE: &[u8] = b"subnet";
pub const NEURON_NAMESPACE: &[u8] = b"neuron";

/// `("subnet", [subnet_id LE])`
pub fn subnet_address(program_id: &Address, subnet_id: u16) -> Result<DerivedAddress, DeriveError> {
    find_derived_address(program_id, SUBNET_NAMESPACE, &[&u16_seed(subnet_id)])
}

/// `("neuron", [subnet_id LE, hotkey])`
pub fn neuron_address(
    program_id: &Address,
    subnet_id: u16,
    hotkey: &Address,
) -> Result<DerivedAddress, DeriveError> {
    find_derived_address(
        program_id,
        NEURON_NAMESPACE,
        &[&u16_seed(subnet_id), hotkey.as_bytes()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: Address = Address([5; 32]);

    #[test]
    fn subnet_and_neuron_spaces_are_disjoint() {
        let s = subnet_address(&PROGRAM, 1).unwrap();
        let n = neuron_address(&PROGRAM, 1, &Address([0; 32])).unwrap();
        assert_ne!(s.address, n.address);
    }

    #[test]
    fn neuron_address_depends_on_subnet_and_hotkey() {
        let h1 = Address([1; 32]);
        let h2 = Address([2; 32]);
        let a = neuron_address(&PROGRAM, 1, &h1).unwrap().address;
        assert_eq!(a, neuron_address(&PROGRAM, 1, &h1).unwrap().address);
        assert_ne!(a, neuron_address(&PROGRAM, 2, &h1).unwrap().address);
        assert_ne!(a, neuron_address(&PROGRAM, 1, &h2).unwrap().address);
    }
}
