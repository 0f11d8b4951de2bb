pub trait DelayOps {
    fn delay_us(&self, micros: u32);
    fn delay_ms(&self, millis: u32);
}

pub trait MonotonicClock {
    fn now_ms(&self) -> u64;
}

pub trait Restart {
    fn restart(&mut self) -> !;
}

impl<T: DelayOps + ?Sized> DelayOps for &T {
    fn delay_us(&self, micros: u32) {
        (**self).delay_us(micros)
    }

    fn delay_ms(&self, millis: u32) {
        (**self).delay_ms(millis)
    }
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
