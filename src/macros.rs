macro_rules! dispatch_family {
    ($type:ident: $family:expr => $expr:expr) => {{
        use crate::{
            config::Family,
            hardware::{ChannelPwm, NativePwm},
        };

        match $family {
            Family::Avr | Family::EspNative => {
                type $type = NativePwm;
                $expr
            }

            Family::EspChannel => {
                type $type = ChannelPwm;
                $expr
            }
        }
    }};
}

macro_rules! emit {
    ($context:expr) => {
        writeln!($context.output())
    };

    ($context:expr, $($format:tt)*) => {{
        $context.indentation()?;
        writeln!($context.output(), $($format)*)
    }};
}
