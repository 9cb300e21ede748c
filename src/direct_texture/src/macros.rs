// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Macros for direct_texture.

#[macro_export]
macro_rules! checked_range {
    ($x:ident <= $y:ident) => {
        checked_range!($x; <= $y)
    };
    ($x:expr; <= $y:expr) => {
        if $x <= $y {
            Ok(())
        } else {
            Err($crate::DirectTextureError::CheckedRange {
                field1: (stringify!($x), ($x) as usize),
                field2: (stringify!($y), ($y) as usize),
            })
        }
    };
}

#[macro_export]
macro_rules! checked_arithmetic {
    ($x:ident $op:ident $y:ident $op_name:expr) => {
        $x.$op($y)
            .ok_or_else(|| $crate::DirectTextureError::CheckedArithmetic {
                field1: (stringify!($x), $x as usize),
                field2: (stringify!($y), $y as usize),
                op: $op_name,
            })
    };
    ($x:ident + $y:ident) => {
        checked_arithmetic!($x checked_add $y "+")
    };
    ($x:ident - $y:ident) => {
        checked_arithmetic!($x checked_sub $y "-")
    };
    ($x:ident * $y:ident) => {
        checked_arithmetic!($x checked_mul $y "*")
    };
}
