macro_rules! generate_getters {
  {
    for $T:ty as $self:ident {
      $(
        $(#[$meta:meta])*
        $field:ident -> $R:ty $(= $e:expr)?
      ),* $(,)?
    }
  } => {
    impl $T {
      $(
        #[inline]
        $(#[$meta])*
        pub fn $field(&$self) -> $R {
          generate_getters!(@getter $self $field $($e)?)
        }
      )*
    }
  };

  (@getter $self:ident $field:ident $e:expr) => ($e);
  (@getter $self:ident $field:ident) => ($self.$field);
}
