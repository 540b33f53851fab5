use rand::Rng;

pub trait VecExtensions<T> {
    fn remove_first_where<F>(&mut self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool;

    /// Removes a uniformly chosen element, `None` when empty.
    fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T>;
}

impl<T> VecExtensions<T> for Vec<T> {
    fn remove_first_where<F>(&mut self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.iter()
            .position(predicate)
            .map(|index| self.remove(index))
    }

    fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.len());
        Some(self.remove(index))
    }
}
