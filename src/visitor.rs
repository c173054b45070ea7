/// Repair hook invoked once per failed object during replay.
pub trait ObjectVisitor {
    fn visit(&mut self, object: *mut u8);
}

impl<F: FnMut(*mut u8) + ?Sized> ObjectVisitor for F {
    #[inline]
    fn visit(&mut self, object: *mut u8) {
        (*self)(object)
    }
}
