//! Math operations

use nex_core::vm::{Cell, VirtualMachine};
use nex_core::{Signal, StepResult};

use crate::args::{ret, Args};

fn unary(args: Vec<Cell>, f: fn(f64) -> f64) -> StepResult<Vec<Cell>> {
    ret(f(Args::new(args).number()?))
}

fn binary(args: Vec<Cell>, f: fn(f64, f64) -> f64) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let x = args.number()?;
    let y = args.number()?;
    ret(f(x, y))
}

pub fn abs(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::abs)
}

pub fn ceil(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::ceil)
}

pub fn floor(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::floor)
}

pub fn sqrt(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::sqrt)
}

pub fn trunc(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::trunc)
}

pub fn exp(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::exp)
}

pub fn log(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, f64::ln)
}

/// `1` or `-1`, following the sign bit
pub fn sign(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    unary(args, |x| 1f64.copysign(x))
}

pub fn min(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    binary(args, f64::min)
}

pub fn max(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    binary(args, f64::max)
}

pub fn intdiv(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    binary(args, |x, y| (x / y).trunc())
}

pub fn odd(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let n = Args::new(args).number()?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(Signal::raise("ValueRangeException", "odd() requires integer"));
    }
    ret((n as i64) & 1 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, vm};

    #[test]
    fn intdiv_truncates_toward_zero() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, intdiv, vec![7.0.into(), 2.0.into()]).unwrap(), vec![Cell::from(3.0)]);
        assert_eq!(call(&mut vm, intdiv, vec![(-7.0).into(), 2.0.into()]).unwrap(), vec![Cell::from(-3.0)]);
    }

    #[test]
    fn odd_requires_an_integer() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, odd, vec![(-3.0).into()]).unwrap(), vec![Cell::from(true)]);
        assert!(matches!(
            call(&mut vm, odd, vec![2.5.into()]),
            Err(Signal::Raise(e)) if e.name == "ValueRangeException"
        ));
    }

    #[test]
    fn min_and_max_keep_argument_order() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, min, vec![4.0.into(), 9.0.into()]).unwrap(), vec![Cell::from(4.0)]);
        assert_eq!(call(&mut vm, max, vec![4.0.into(), 9.0.into()]).unwrap(), vec![Cell::from(9.0)]);
        assert_eq!(call(&mut vm, sign, vec![(-0.5).into()]).unwrap(), vec![Cell::from(-1.0)]);
    }
}
