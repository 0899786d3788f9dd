// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0
use std::io::stdout;

use crossterm::tty::IsTty;

pub use crossterm::style::Stylize;

macro_rules! impl_method {
    ($method:ident) => {
        fn $method(self) -> <Self as Stylize>::Styled {
            if stdout().is_tty() {
                <Self as Stylize>::$method(self)
            } else {
                self.stylize()
            }
        }
    };
}

/// Wrapper around [`Stylize`] which does nothing if stdout isn't a TTY
pub trait Styled: Stylize {
    impl_method!(reset);
    impl_method!(bold);
    impl_method!(underlined);
    impl_method!(dim);
    impl_method!(italic);
    impl_method!(black);
    impl_method!(red);
    impl_method!(green);
    impl_method!(yellow);
    impl_method!(blue);
    impl_method!(magenta);
    impl_method!(cyan);
    impl_method!(white);
    impl_method!(grey);
}

impl<T> Styled for T where T: Stylize {}
