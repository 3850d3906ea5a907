//! Gas accounting: three running totals — CPU, RAM, storage —
//! all drawn from a single shared `gas_limit` budget, plus nested scopes
//! that cap a sub-computation's spend without losing track of the unused
//! remainder.

use num_bigint::BigInt;
use num_traits::Zero;

use tessera_types::GasConsumed;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum GasError {
    #[error("out of gas: requested {requested}, only {remaining} remaining")]
    OutOfGas { requested: BigInt, remaining: BigInt },
}

/// Tracks gas consumption for one delivery (or one `with_gas` nested
/// scope). `remaining` is the shared budget; `cpu`/`ram`/`storage` are
/// running totals kept purely for reporting in [`GasConsumed`] — they do
/// not each have their own sub-budget ("CPU, RAM, and storage
/// gas are tracked in three running totals").
#[derive(Debug, Clone)]
pub struct GasMeter {
    remaining: BigInt,
    cpu: BigInt,
    ram: BigInt,
    storage: BigInt,
}

impl GasMeter {
    pub fn new(gas_limit: BigInt) -> Self {
        Self {
            remaining: gas_limit,
            cpu: BigInt::zero(),
            ram: BigInt::zero(),
            storage: BigInt::zero(),
        }
    }

    pub fn remaining(&self) -> &BigInt {
        &self.remaining
    }

    fn charge(&mut self, amount: &BigInt, bucket: impl FnOnce(&mut Self) -> &mut BigInt) -> Result<(), GasError> {
        if amount > &self.remaining {
            log::debug!("out of gas: requested {amount}, only {} remaining", self.remaining);
            return Err(GasError::OutOfGas {
                requested: amount.clone(),
                remaining: self.remaining.clone(),
            });
        }
        self.remaining -= amount;
        *bucket(self) += amount;
        log::trace!("charged {amount}, {} remaining", self.remaining);
        Ok(())
    }

    pub fn charge_gas_for_cpu(&mut self, amount: &BigInt) -> Result<(), GasError> {
        self.charge(amount, |s| &mut s.cpu)
    }

    pub fn charge_gas_for_ram(&mut self, amount: &BigInt) -> Result<(), GasError> {
        self.charge(amount, |s| &mut s.ram)
    }

    pub fn charge_gas_for_storage(&mut self, amount: &BigInt) -> Result<(), GasError> {
        self.charge(amount, |s| &mut s.storage)
    }

    /// Runs `code` in a nested scope capped at `amount`, folding whatever it
    /// actually spent back into this meter's totals and returning the
    /// unused portion of `amount` to `self.remaining` (/// "`with_gas(amount, code)` runs a nested scope with a capped budget
    /// and returns unused portion to the outer scope on exit").
    pub fn with_gas<T>(
        &mut self,
        amount: BigInt,
        code: impl FnOnce(&mut GasMeter) -> Result<T, GasError>,
    ) -> Result<T, GasError> {
        if amount > self.remaining {
            return Err(GasError::OutOfGas {
                requested: amount,
                remaining: self.remaining.clone(),
            });
        }
        self.remaining -= &amount;
        let mut nested = GasMeter::new(amount.clone());
        let result = code(&mut nested);
        let unused = nested.remaining.clone();
        self.remaining += unused;
        self.cpu += nested.cpu;
        self.ram += nested.ram;
        self.storage += nested.storage;
        result
    }

    pub fn gas_consumed(&self) -> GasConsumed {
        GasConsumed::new(self.cpu.clone(), self.ram.clone(), self.storage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_draw_down_the_shared_budget() {
        let mut meter = GasMeter::new(BigInt::from(100));
        meter.charge_gas_for_cpu(&BigInt::from(30)).unwrap();
        meter.charge_gas_for_ram(&BigInt::from(20)).unwrap();
        assert_eq!(meter.remaining(), &BigInt::from(50));
        let consumed = meter.gas_consumed();
        assert_eq!(consumed.cpu, BigInt::from(30));
        assert_eq!(consumed.ram, BigInt::from(20));
        assert_eq!(consumed.storage, BigInt::zero());
    }

    #[test]
    fn charge_beyond_remaining_fails() {
        let mut meter = GasMeter::new(BigInt::from(10));
        let err = meter.charge_gas_for_cpu(&BigInt::from(11)).unwrap_err();
        assert_eq!(
            err,
            GasError::OutOfGas {
                requested: BigInt::from(11),
                remaining: BigInt::from(10)
            }
        );
    }

    #[test]
    fn with_gas_returns_unused_portion_to_the_outer_scope() {
        let mut meter = GasMeter::new(BigInt::from(100));
        meter
            .with_gas(BigInt::from(40), |nested| nested.charge_gas_for_cpu(&BigInt::from(25)))
            .unwrap();
        // 40 requested, only 25 spent: 15 returned, so 85 remains overall.
        assert_eq!(meter.remaining(), &BigInt::from(85));
        assert_eq!(meter.gas_consumed().cpu, BigInt::from(25));
    }

    #[test]
    fn with_gas_propagates_a_failure_from_the_nested_scope() {
        let mut meter = GasMeter::new(BigInt::from(100));
        let result = meter.with_gas(BigInt::from(10), |nested| nested.charge_gas_for_cpu(&BigInt::from(20)));
        assert!(result.is_err());
        // the failed nested attempt charged nothing, so the cap itself is returned.
        assert_eq!(meter.remaining(), &BigInt::from(100));
    }

    #[test]
    fn with_gas_request_exceeding_outer_remaining_fails_without_mutating_state() {
        let mut meter = GasMeter::new(BigInt::from(5));
        let result = meter.with_gas(BigInt::from(6), |nested| nested.charge_gas_for_cpu(&BigInt::from(1)));
        assert!(result.is_err());
        assert_eq!(meter.remaining(), &BigInt::from(5));
    }
}
