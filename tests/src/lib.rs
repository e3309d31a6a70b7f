#[cfg(test)]
mod server_util;

#[cfg(test)]
mod test_concurrency;
#[cfg(test)]
mod test_end_to_end;
#[cfg(test)]
mod test_persistence;
