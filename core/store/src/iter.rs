/// A bidirectional cursor over a store's ordered keyspace.
///
/// Shaped after RocksDB's raw iterator (`seek_to_first`/`seek_to_last`/
/// `next`/`prev`/`valid`/`key`/`value`) so both backends — and the
/// Migrator's producer stage, which just wants "give me keys in order" —
/// can share one interface.
pub trait Iter {
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    fn seek(&mut self, key: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn valid(&self) -> bool;
    fn key(&self) -> Option<&[u8]>;
    fn value(&self) -> Option<&[u8]>;
}
